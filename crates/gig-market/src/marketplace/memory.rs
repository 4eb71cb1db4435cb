use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::domain::{ApplicationId, ApplicationQuery, Job, JobApplication, JobId, WorkerId};
use super::repository::{ApplicationRepository, JobRepository, RepositoryError, WorkerDirectory};
use crate::scoring::WorkerProfile;

#[derive(Debug, Default)]
struct StoreState {
    applications: HashMap<ApplicationId, JobApplication>,
    jobs: HashMap<JobId, Job>,
    revision: u64,
}

/// Process-local application store. Clones share the same state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ApplicationRepository for InMemoryStore {
    fn insert(&self, application: JobApplication) -> Result<JobApplication, RepositoryError> {
        let mut state = self.state();
        if state.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        state
            .applications
            .insert(application.id.clone(), application.clone());
        state.revision += 1;
        Ok(application)
    }

    fn update(&self, application: JobApplication) -> Result<(), RepositoryError> {
        let mut guard = self.state();
        let state = &mut *guard;
        match state.applications.get_mut(&application.id) {
            Some(slot) => {
                *slot = application;
                state.revision += 1;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<JobApplication>, RepositoryError> {
        Ok(self.state().applications.get(id).cloned())
    }

    fn list(&self, query: &ApplicationQuery) -> Result<Vec<JobApplication>, RepositoryError> {
        let state = self.state();
        let mut matching: Vec<JobApplication> = state
            .applications
            .values()
            .filter(|application| query.matches(application))
            .cloned()
            .collect();
        matching.sort_by(|left, right| {
            left.applied_at
                .cmp(&right.applied_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(matching)
    }

    fn revision(&self) -> Result<u64, RepositoryError> {
        Ok(self.state().revision)
    }
}

impl JobRepository for InMemoryStore {
    fn insert_job(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut state = self.state();
        if state.jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        state.jobs.insert(job.id.clone(), job.clone());
        state.revision += 1;
        Ok(job)
    }

    fn update_job(&self, job: Job) -> Result<(), RepositoryError> {
        let mut guard = self.state();
        let state = &mut *guard;
        match state.jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                state.revision += 1;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.state().jobs.get(id).cloned())
    }
}

/// Stand-in for the worker identity service.
#[derive(Debug, Default, Clone)]
pub struct InMemoryWorkerDirectory {
    profiles: Arc<Mutex<HashMap<WorkerId, WorkerProfile>>>,
}

impl WorkerDirectory for InMemoryWorkerDirectory {
    fn profile(&self, worker_id: &WorkerId) -> Result<Option<WorkerProfile>, RepositoryError> {
        let profiles = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(profiles.get(worker_id).cloned())
    }

    fn upsert_profile(&self, profile: WorkerProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        profiles.insert(profile.worker_id.clone(), profile);
        Ok(())
    }
}
