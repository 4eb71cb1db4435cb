use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationQuery, ApplicationSnapshot, ApplicationStatus,
    EmployerId, InvariantViolation, Job, JobApplication, JobId, JobStatus, NewJob, PaymentStatus,
    PaymentUpdate, WorkerId,
};
use super::import::{ImportError, ImportSummary, SeedBatch};
use super::repository::{ApplicationRepository, JobRepository, RepositoryError};
use super::transitions::{action_for, rule_for};

/// Source of timestamps for `applied_at`, `completed_at` and friends.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The status transition engine. Every write to applications and jobs goes through here, serialized
/// by a single writer lock so that concurrent sessions cannot interleave read-modify-write cycles.
pub struct ApplicationService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    writes: Mutex<()>,
    application_sequence: AtomicU64,
    job_sequence: AtomicU64,
}

impl<R> ApplicationService<R>
where
    R: ApplicationRepository + JobRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_clock(repository, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            writes: Mutex::new(()),
            application_sequence: AtomicU64::new(1),
            job_sequence: AtomicU64::new(1),
        }
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_application_id(&self) -> Result<ApplicationId, RepositoryError> {
        loop {
            let seq = self.application_sequence.fetch_add(1, Ordering::Relaxed);
            let id = ApplicationId(format!("app-{seq:06}"));
            if self.repository.fetch(&id)?.is_none() {
                return Ok(id);
            }
        }
    }

    fn next_job_id(&self) -> Result<JobId, RepositoryError> {
        loop {
            let seq = self.job_sequence.fetch_add(1, Ordering::Relaxed);
            let id = JobId(format!("job-{seq:06}"));
            if self.repository.fetch_job(&id)?.is_none() {
                return Ok(id);
            }
        }
    }

    fn load(&self, id: &ApplicationId) -> Result<JobApplication, ApplicationServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(id.clone()))
    }

    fn load_job(&self, id: &JobId) -> Result<Job, ApplicationServiceError> {
        self.repository
            .fetch_job(id)?
            .ok_or_else(|| ApplicationServiceError::JobNotFound(id.clone()))
    }

    /// Create a job posting in `active`.
    pub fn post_job(
        &self,
        employer_id: &EmployerId,
        posting: NewJob,
    ) -> Result<Job, ApplicationServiceError> {
        let title = posting.title.trim();
        if title.is_empty() {
            return Err(ApplicationServiceError::InvalidJob(
                "title must not be empty".to_string(),
            ));
        }
        if posting.workers_needed == 0 {
            return Err(ApplicationServiceError::InvalidJob(
                "workers_needed must be at least 1".to_string(),
            ));
        }

        let _writer = self.write_lock();
        let job = Job {
            id: self.next_job_id()?,
            employer_id: employer_id.clone(),
            title: title.to_string(),
            company_name: posting.company_name,
            location: posting.location,
            salary: posting.salary,
            workers_needed: posting.workers_needed,
            status: JobStatus::Active,
            posted_at: self.clock.now(),
        };
        let stored = self.repository.insert_job(job)?;
        info!(job_id = %stored.id, employer_id = %stored.employer_id, "job posted");
        Ok(stored)
    }

    /// Stop accepting applications for an active job.
    pub fn close_job(&self, job_id: &JobId, actor: &Actor) -> Result<Job, ApplicationServiceError> {
        let _writer = self.write_lock();
        let mut job = self.load_job(job_id)?;
        match actor {
            Actor::Employer(employer) if *employer == job.employer_id => {}
            _ => {
                return Err(ApplicationServiceError::Forbidden {
                    role: actor.role(),
                    action: "close_job",
                })
            }
        }
        if job.status != JobStatus::Active {
            return Err(ApplicationServiceError::JobNotOpen {
                job_id: job.id,
                status: job.status,
            });
        }
        job.status = JobStatus::Closed;
        self.repository.update_job(job.clone())?;
        info!(job_id = %job.id, "job closed");
        Ok(job)
    }

    pub fn job(&self, job_id: &JobId) -> Result<Job, ApplicationServiceError> {
        self.load_job(job_id)
    }

    /// Apply to a job. A worker holds at most one live application per job.
    pub fn submit(
        &self,
        job_id: &JobId,
        worker_id: &WorkerId,
    ) -> Result<JobApplication, ApplicationServiceError> {
        let _writer = self.write_lock();
        let job = self.load_job(job_id)?;
        if job.status != JobStatus::Active {
            return Err(ApplicationServiceError::JobNotOpen {
                job_id: job.id,
                status: job.status,
            });
        }

        let pair = ApplicationQuery {
            worker_id: Some(worker_id.clone()),
            job_id: Some(job_id.clone()),
            status: None,
        };
        if let Some(existing) = self
            .repository
            .list(&pair)?
            .into_iter()
            .find(|application| application.status.is_live())
        {
            debug!(
                job_id = %job_id,
                worker_id = %worker_id,
                existing = %existing.id,
                "duplicate application rejected"
            );
            return Err(ApplicationServiceError::DuplicateApplication {
                job_id: job_id.clone(),
                worker_id: worker_id.clone(),
            });
        }

        let application = JobApplication {
            id: self.next_application_id()?,
            job_id: job.id,
            worker_id: worker_id.clone(),
            employer_id: job.employer_id,
            status: ApplicationStatus::Pending,
            applied_at: self.clock.now(),
            is_final_selection: false,
            payment_status: None,
            payment_amount: None,
            payment_date: None,
            completed_at: None,
        };
        let stored = self.repository.insert(application)?;
        info!(
            application_id = %stored.id,
            job_id = %stored.job_id,
            worker_id = %stored.worker_id,
            "application submitted"
        );
        Ok(stored)
    }

    /// Move an application along the transition table.
    pub fn set_status(
        &self,
        application_id: &ApplicationId,
        target: ApplicationStatus,
        actor: &Actor,
    ) -> Result<JobApplication, ApplicationServiceError> {
        let _writer = self.write_lock();
        self.apply_status(application_id, target, actor)
    }

    /// Worker withdrawal; only possible before the employer has acted.
    pub fn cancel(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<JobApplication, ApplicationServiceError> {
        self.set_status(application_id, ApplicationStatus::Cancelled, actor)
    }

    pub fn mark_complete(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<JobApplication, ApplicationServiceError> {
        self.set_status(application_id, ApplicationStatus::Completed, actor)
    }

    fn apply_status(
        &self,
        application_id: &ApplicationId,
        target: ApplicationStatus,
        actor: &Actor,
    ) -> Result<JobApplication, ApplicationServiceError> {
        let mut application = self.load(application_id)?;
        let from = application.status;
        let action = action_for(target);

        let Some(initiator) = rule_for(from, target) else {
            debug!(application_id = %application.id, %from, to = %target, "illegal transition");
            return Err(ApplicationServiceError::IllegalTransition { from, action });
        };
        if !initiator.admits(actor.role()) {
            return Err(ApplicationServiceError::Forbidden {
                role: actor.role(),
                action,
            });
        }
        authorize_party(&application, actor, action)?;

        application.status = target;
        let mut released_selection = false;
        match target {
            ApplicationStatus::Completed => {
                application.completed_at = Some(self.clock.now());
                application.payment_status.get_or_insert(PaymentStatus::Pending);
            }
            ApplicationStatus::Rejected if application.is_final_selection => {
                application.is_final_selection = false;
                released_selection = true;
            }
            _ => {}
        }

        self.repository.update(application.clone())?;
        info!(
            application_id = %application.id,
            %from,
            to = %target,
            actor = actor.role().label(),
            "application status changed"
        );

        if target == ApplicationStatus::Completed {
            self.settle_job_after_completion(&application.job_id)?;
        } else if released_selection {
            self.release_job_selection(&application.job_id)?;
        }

        Ok(application)
    }

    /// Employer confirms an accepted applicant. At most one application per job holds the flag.
    pub fn select_final(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<JobApplication, ApplicationServiceError> {
        const ACTION: &str = "select_final";

        let _writer = self.write_lock();
        let mut application = self.load(application_id)?;
        if actor.role() != ActorRole::Employer {
            return Err(ApplicationServiceError::Forbidden {
                role: actor.role(),
                action: ACTION,
            });
        }
        authorize_party(&application, actor, ACTION)?;

        if application.status != ApplicationStatus::Accepted {
            return Err(ApplicationServiceError::IllegalTransition {
                from: application.status,
                action: ACTION,
            });
        }

        if application.is_final_selection {
            return Ok(application);
        }

        let mut job = self.load_job(&application.job_id)?;
        if matches!(job.status, JobStatus::Closed | JobStatus::Completed) {
            return Err(ApplicationServiceError::JobNotOpen {
                job_id: job.id,
                status: job.status,
            });
        }
        if let Some(holder) = self
            .repository
            .list(&ApplicationQuery::for_job(job.id.clone()))?
            .into_iter()
            .find(|other| other.is_final_selection && other.id != application.id)
        {
            debug!(application_id = %application.id, holder = %holder.id, "final selection taken");
            return Err(ApplicationServiceError::AlreadySelected {
                job_id: job.id,
                selected: holder.id,
            });
        }

        application.is_final_selection = true;
        self.repository.update(application.clone())?;
        info!(application_id = %application.id, job_id = %job.id, "final selection made");

        if job.status == JobStatus::Active {
            job.status = JobStatus::InProgress;
            self.repository.update_job(job.clone())?;
            info!(job_id = %job.id, "job moved to in-progress");
        }

        Ok(application)
    }

    /// Record payment progress on completed work. Amounts are stored, not reconciled.
    pub fn update_payment(
        &self,
        application_id: &ApplicationId,
        update: PaymentUpdate,
        actor: &Actor,
    ) -> Result<JobApplication, ApplicationServiceError> {
        const ACTION: &str = "update_payment";

        let _writer = self.write_lock();
        let mut application = self.load(application_id)?;
        if actor.role() != ActorRole::Employer {
            return Err(ApplicationServiceError::Forbidden {
                role: actor.role(),
                action: ACTION,
            });
        }
        authorize_party(&application, actor, ACTION)?;

        if application.status != ApplicationStatus::Completed {
            return Err(ApplicationServiceError::IllegalTransition {
                from: application.status,
                action: ACTION,
            });
        }

        let current = application.payment_status.unwrap_or(PaymentStatus::Pending);
        if current == PaymentStatus::Paid {
            return Err(ApplicationServiceError::InvalidPayment(
                "payment already settled".to_string(),
            ));
        }
        if update.status < current {
            return Err(ApplicationServiceError::InvalidPayment(format!(
                "payment cannot move from {} back to {}",
                current.label(),
                update.status.label()
            )));
        }

        application.payment_status = Some(update.status);
        if let Some(amount) = update.amount {
            application.payment_amount = Some(amount);
        }
        if update.status == PaymentStatus::Paid {
            application.payment_date = Some(self.clock.now());
        }

        self.repository.update(application.clone())?;
        info!(
            application_id = %application.id,
            payment = update.status.label(),
            "payment status updated"
        );
        Ok(application)
    }

    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<JobApplication, ApplicationServiceError> {
        self.load(application_id)
    }

    /// Dashboard read model.
    pub fn applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<ApplicationSnapshot, ApplicationServiceError> {
        // Read the revision first: the data may be newer than the tag, never older.
        let revision = self.repository.revision()?;
        let applications = self.repository.list(query)?;
        Ok(ApplicationSnapshot {
            revision,
            applications,
        })
    }

    pub fn revision(&self) -> Result<u64, ApplicationServiceError> {
        Ok(self.repository.revision()?)
    }

    fn settle_job_after_completion(&self, job_id: &JobId) -> Result<(), ApplicationServiceError> {
        let mut job = self.load_job(job_id)?;
        if job.status != JobStatus::InProgress {
            return Ok(());
        }
        let outstanding = self
            .repository
            .list(&ApplicationQuery::for_job(job_id.clone()))?
            .iter()
            .any(|application| {
                application.status == ApplicationStatus::InProgress
                    || (application.is_final_selection
                        && application.status != ApplicationStatus::Completed)
            });
        if !outstanding {
            job.status = JobStatus::Completed;
            self.repository.update_job(job)?;
            info!(job_id = %job_id, "job completed");
        }
        Ok(())
    }

    fn release_job_selection(&self, job_id: &JobId) -> Result<(), ApplicationServiceError> {
        let mut job = self.load_job(job_id)?;
        if job.status != JobStatus::InProgress {
            return Ok(());
        }
        let still_selected = self
            .repository
            .list(&ApplicationQuery::for_job(job_id.clone()))?
            .iter()
            .any(|application| application.is_final_selection);
        if !still_selected {
            job.status = JobStatus::Active;
            self.repository.update_job(job)?;
            info!(job_id = %job_id, "final selection released, job reopened");
        }
        Ok(())
    }

    /// Load externally produced records after checking every data-model invariant against the batch
    /// and the current store contents. Nothing is written if any record is rejected.
    pub fn import(&self, batch: SeedBatch) -> Result<ImportSummary, ImportError> {
        let _writer = self.write_lock();

        let mut employers: HashMap<JobId, EmployerId> = HashMap::new();
        for job in &batch.jobs {
            if job.workers_needed == 0 {
                return Err(InvariantViolation::NoWorkersNeeded {
                    job_id: job.id.clone(),
                }
                .into());
            }
            if employers
                .insert(job.id.clone(), job.employer_id.clone())
                .is_some()
            {
                return Err(RepositoryError::Conflict.into());
            }
        }

        let mut applications = Vec::with_capacity(batch.applications.len());
        for draft in batch.applications {
            let employer_id = match employers.get(&draft.job_id) {
                Some(employer) => employer.clone(),
                None => match self.repository.fetch_job(&draft.job_id)? {
                    Some(job) => job.employer_id,
                    None => {
                        return Err(InvariantViolation::UnknownJob {
                            application_id: draft.id.clone(),
                            job_id: draft.job_id.clone(),
                        }
                        .into())
                    }
                },
            };
            let application = draft.into_application(employer_id)?;
            application.check_invariants()?;
            applications.push(application);
        }

        let mut finals: HashSet<JobId> = HashSet::new();
        let mut live_pairs: HashSet<(JobId, WorkerId)> = HashSet::new();
        let touched_jobs: HashSet<JobId> = applications
            .iter()
            .map(|application| application.job_id.clone())
            .collect();
        for job_id in touched_jobs {
            for existing in self.repository.list(&ApplicationQuery::for_job(job_id))? {
                if existing.is_final_selection {
                    finals.insert(existing.job_id.clone());
                }
                if existing.status.is_live() {
                    live_pairs.insert((existing.job_id, existing.worker_id));
                }
            }
        }
        for application in &applications {
            if application.is_final_selection && !finals.insert(application.job_id.clone()) {
                return Err(InvariantViolation::MultipleFinalSelections {
                    job_id: application.job_id.clone(),
                }
                .into());
            }
            if application.status.is_live()
                && !live_pairs.insert((application.job_id.clone(), application.worker_id.clone()))
            {
                return Err(InvariantViolation::DuplicateLiveApplication {
                    job_id: application.job_id.clone(),
                    worker_id: application.worker_id.clone(),
                }
                .into());
            }
        }

        for job in &batch.jobs {
            if self.repository.fetch_job(&job.id)?.is_some() {
                return Err(RepositoryError::Conflict.into());
            }
        }
        let mut application_ids: HashSet<&ApplicationId> = HashSet::new();
        for application in &applications {
            if !application_ids.insert(&application.id)
                || self.repository.fetch(&application.id)?.is_some()
            {
                return Err(RepositoryError::Conflict.into());
            }
        }

        let summary = ImportSummary {
            jobs: batch.jobs.len(),
            applications: applications.len(),
        };
        for job in batch.jobs {
            self.repository.insert_job(job)?;
        }
        for application in applications {
            self.repository.insert(application)?;
        }
        info!(
            jobs = summary.jobs,
            applications = summary.applications,
            "seed records imported"
        );
        Ok(summary)
    }
}

fn authorize_party(
    application: &JobApplication,
    actor: &Actor,
    action: &'static str,
) -> Result<(), ApplicationServiceError> {
    let owns = match actor {
        Actor::Worker(worker) => *worker == application.worker_id,
        Actor::Employer(employer) => *employer == application.employer_id,
    };
    if owns {
        Ok(())
    } else {
        Err(ApplicationServiceError::Forbidden {
            role: actor.role(),
            action,
        })
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("worker {worker_id} already has an open application for job {job_id}")]
    DuplicateApplication { job_id: JobId, worker_id: WorkerId },
    #[error("cannot {action} an application that is {from}")]
    IllegalTransition {
        from: ApplicationStatus,
        action: &'static str,
    },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("{} may not {action} this application", .role.label())]
    Forbidden {
        role: ActorRole,
        action: &'static str,
    },
    #[error("job {job_id} already has a final selection ({selected})")]
    AlreadySelected {
        job_id: JobId,
        selected: ApplicationId,
    },
    #[error("job {job_id} is {status}")]
    JobNotOpen { job_id: JobId, status: JobStatus },
    #[error("invalid job posting: {0}")]
    InvalidJob(String),
    #[error("invalid payment update: {0}")]
    InvalidPayment(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApplicationServiceError {
    /// Stable machine-readable kind used in API error bodies.
    pub const fn kind(&self) -> &'static str {
        match self {
            ApplicationServiceError::DuplicateApplication { .. } => "duplicate_application",
            ApplicationServiceError::IllegalTransition { .. } => "illegal_transition",
            ApplicationServiceError::NotFound(_) => "not_found",
            ApplicationServiceError::JobNotFound(_) => "job_not_found",
            ApplicationServiceError::Forbidden { .. } => "forbidden",
            ApplicationServiceError::AlreadySelected { .. } => "already_selected",
            ApplicationServiceError::JobNotOpen { .. } => "job_not_open",
            ApplicationServiceError::InvalidJob(_) => "invalid_job",
            ApplicationServiceError::InvalidPayment(_) => "invalid_payment",
            ApplicationServiceError::Repository(_) => "repository",
        }
    }
}
