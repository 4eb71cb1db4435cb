use super::domain::{ApplicationId, ApplicationQuery, Job, JobApplication, JobId, WorkerId};
use crate::scoring::WorkerProfile;

/// Storage abstraction for applications so the engine can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: JobApplication) -> Result<JobApplication, RepositoryError>;
    fn update(&self, application: JobApplication) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<JobApplication>, RepositoryError>;
    /// Matching applications ordered by `applied_at`, then id.
    fn list(&self, query: &ApplicationQuery) -> Result<Vec<JobApplication>, RepositoryError>;
    /// Monotonic counter bumped by every write to the store.
    fn revision(&self) -> Result<u64, RepositoryError>;
}

pub trait JobRepository: Send + Sync {
    fn insert_job(&self, job: Job) -> Result<Job, RepositoryError>;
    fn update_job(&self, job: Job) -> Result<(), RepositoryError>;
    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
}

/// Read side of worker identity management, which owns the profiles.
pub trait WorkerDirectory: Send + Sync {
    fn profile(&self, worker_id: &WorkerId) -> Result<Option<WorkerProfile>, RepositoryError>;
    fn upsert_profile(&self, profile: WorkerProfile) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
