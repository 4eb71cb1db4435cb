//! Job application lifecycle: the data model, the status transition engine, the application store,
//! and the HTTP boundary the dashboards call into.

pub mod domain;
pub mod import;
pub mod memory;
pub mod normalize;
pub mod repository;
pub mod router;
pub mod service;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, ActorRole, ApplicationId, ApplicationQuery, ApplicationSnapshot, ApplicationStatus,
    EmployerId, InvariantViolation, Job, JobApplication, JobId, JobStatus, NewJob, PaymentStatus,
    PaymentUpdate, WorkerId,
};
pub use import::{load_seed, load_seed_from_path, ImportError, ImportSummary, SeedBatch};
pub use memory::{InMemoryStore, InMemoryWorkerDirectory};
pub use normalize::{
    application_from_payload, job_from_payload, new_job_from_payload, ApplicationDraft,
    NormalizationError,
};
pub use repository::{ApplicationRepository, JobRepository, RepositoryError, WorkerDirectory};
pub use router::marketplace_router;
pub use service::{ApplicationService, ApplicationServiceError, Clock, SystemClock};
