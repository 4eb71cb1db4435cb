use std::sync::Arc;

use async_trait::async_trait;

use super::{Fetch, SnapshotSource, SyncError};
use crate::marketplace::{
    ApplicationQuery, ApplicationRepository, ApplicationService, ApplicationServiceError,
    ApplicationStatus, Job, JobApplication, JobId, JobRepository, WorkerId,
};

fn fetch_error(error: ApplicationServiceError) -> SyncError {
    SyncError::Fetch(error.to_string())
}

/// Application list behind a worker or employer dashboard.
pub struct ApplicationsSource<R> {
    service: Arc<ApplicationService<R>>,
    query: ApplicationQuery,
}

impl<R> ApplicationsSource<R> {
    pub fn new(service: Arc<ApplicationService<R>>, query: ApplicationQuery) -> Self {
        Self { service, query }
    }

    /// "My applications", optionally narrowed to one status tab.
    pub fn worker_dashboard(
        service: Arc<ApplicationService<R>>,
        worker_id: WorkerId,
        status: Option<ApplicationStatus>,
    ) -> Self {
        let mut query = ApplicationQuery::for_worker(worker_id);
        query.status = status;
        Self::new(service, query)
    }

    /// Applicants for one of the employer's jobs.
    pub fn job_applicants(service: Arc<ApplicationService<R>>, job_id: JobId) -> Self {
        Self::new(service, ApplicationQuery::for_job(job_id))
    }
}

#[async_trait]
impl<R> SnapshotSource for ApplicationsSource<R>
where
    R: ApplicationRepository + JobRepository + 'static,
{
    type Data = Vec<JobApplication>;

    async fn fetch(&self, known_revision: Option<u64>) -> Result<Fetch<Self::Data>, SyncError> {
        let revision = self.service.revision().map_err(fetch_error)?;
        if known_revision == Some(revision) {
            return Ok(Fetch::NotModified);
        }
        let snapshot = self.service.applications(&self.query).map_err(fetch_error)?;
        Ok(Fetch::Updated {
            revision: snapshot.revision,
            data: snapshot.applications,
        })
    }
}

/// A single job card, e.g. the header of the employer's applicant view.
pub struct JobSource<R> {
    service: Arc<ApplicationService<R>>,
    job_id: JobId,
}

impl<R> JobSource<R> {
    pub fn new(service: Arc<ApplicationService<R>>, job_id: JobId) -> Self {
        Self { service, job_id }
    }
}

#[async_trait]
impl<R> SnapshotSource for JobSource<R>
where
    R: ApplicationRepository + JobRepository + 'static,
{
    type Data = Job;

    async fn fetch(&self, known_revision: Option<u64>) -> Result<Fetch<Self::Data>, SyncError> {
        let revision = self.service.revision().map_err(fetch_error)?;
        if known_revision == Some(revision) {
            return Ok(Fetch::NotModified);
        }
        let job = self.service.job(&self.job_id).map_err(fetch_error)?;
        Ok(Fetch::Updated {
            revision,
            data: job,
        })
    }
}
