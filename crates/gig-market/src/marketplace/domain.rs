use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for job applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmployerId(pub String);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(ApplicationId, JobId, WorkerId, EmployerId);

/// The party issuing a mutation. Authentication is out of scope, so the identity is taken as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Worker(WorkerId),
    Employer(EmployerId),
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Worker(_) => ActorRole::Worker,
            Actor::Employer(_) => ActorRole::Employer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Worker,
    Employer,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Worker => "worker",
            ActorRole::Employer => "employer",
        }
    }
}

/// Lifecycle state of a worker's application to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::InProgress,
        ApplicationStatus::Completed,
        ApplicationStatus::Cancelled,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::InProgress => "in-progress",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    /// Accepts the canonical label as well as the `in_progress`, `inProgress` and `In Progress`
    /// spellings seen from older clients.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let folded: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(*ch, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "pending" => Some(ApplicationStatus::Pending),
            "accepted" => Some(ApplicationStatus::Accepted),
            "rejected" => Some(ApplicationStatus::Rejected),
            "inprogress" => Some(ApplicationStatus::InProgress),
            "completed" => Some(ApplicationStatus::Completed),
            "cancelled" | "canceled" => Some(ApplicationStatus::Cancelled),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Completed | ApplicationStatus::Rejected | ApplicationStatus::Cancelled
        )
    }

    /// Whether the application still counts against the one-live-application-per-pair rule.
    pub const fn is_live(self) -> bool {
        !matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Cancelled)
    }

    /// States in which the final-selection flag may be held.
    pub const fn permits_final_selection(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::InProgress | ApplicationStatus::Completed
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "unpaid" => Some(PaymentStatus::Pending),
            "processing" | "in_process" | "in-process" => Some(PaymentStatus::Processing),
            "paid" | "settled" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Active,
    InProgress,
    Completed,
    Closed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::InProgress => "in-progress",
            JobStatus::Completed => "completed",
            JobStatus::Closed => "closed",
        }
    }

    pub fn parse_label(raw: &str) -> Option<Self> {
        let folded: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(*ch, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "active" | "open" => Some(JobStatus::Active),
            "inprogress" => Some(JobStatus::InProgress),
            "completed" => Some(JobStatus::Completed),
            "closed" => Some(JobStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A posted job. Only the fields the lifecycle needs plus the display fields normalized at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub employer_id: EmployerId,
    pub title: String,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub salary: Option<u32>,
    pub workers_needed: u32,
    pub status: JobStatus,
    pub posted_at: DateTime<Utc>,
}

/// Employer input for a new job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub salary: Option<u32>,
    pub workers_needed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub employer_id: EmployerId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub is_final_selection: bool,
    /// Unset until the work is completed.
    pub payment_status: Option<PaymentStatus>,
    pub payment_amount: Option<u32>,
    pub payment_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobApplication {
    /// Record-level invariants; the per-job and per-pair rules are checked by the store's writer.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.is_final_selection && !self.status.permits_final_selection() {
            return Err(InvariantViolation::FinalSelectionStatus {
                application_id: self.id.clone(),
                status: self.status,
            });
        }
        if self.payment_status == Some(PaymentStatus::Paid)
            && self.status != ApplicationStatus::Completed
        {
            return Err(InvariantViolation::PaidBeforeCompletion {
                application_id: self.id.clone(),
                status: self.status,
            });
        }
        if self.status == ApplicationStatus::Completed && self.completed_at.is_none() {
            return Err(InvariantViolation::MissingCompletionTime {
                application_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Broken data-model rule, reported when records enter the store from outside the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("application {application_id} holds the final selection while {status}")]
    FinalSelectionStatus {
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
    #[error("application {application_id} is marked paid while {status}")]
    PaidBeforeCompletion {
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
    #[error("application {application_id} is completed without a completion time")]
    MissingCompletionTime { application_id: ApplicationId },
    #[error("job {job_id} has more than one final selection")]
    MultipleFinalSelections { job_id: JobId },
    #[error("worker {worker_id} has more than one live application to job {job_id}")]
    DuplicateLiveApplication { job_id: JobId, worker_id: WorkerId },
    #[error("application {application_id} references unknown job {job_id}")]
    UnknownJob {
        application_id: ApplicationId,
        job_id: JobId,
    },
    #[error("application {application_id} names a different employer than job {job_id}")]
    EmployerMismatch {
        application_id: ApplicationId,
        job_id: JobId,
    },
    #[error("job {job_id} needs at least one worker")]
    NoWorkersNeeded { job_id: JobId },
}

/// Filters for the dashboard read models. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationQuery {
    pub worker_id: Option<WorkerId>,
    pub job_id: Option<JobId>,
    pub status: Option<ApplicationStatus>,
}

impl ApplicationQuery {
    pub fn for_worker(worker_id: WorkerId) -> Self {
        Self {
            worker_id: Some(worker_id),
            ..Self::default()
        }
    }

    pub fn for_job(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, application: &JobApplication) -> bool {
        self.worker_id
            .as_ref()
            .map_or(true, |worker| &application.worker_id == worker)
            && self
                .job_id
                .as_ref()
                .map_or(true, |job| &application.job_id == job)
            && self
                .status
                .map_or(true, |status| application.status == status)
    }
}

/// Read model handed to dashboards: the matching applications and the store revision they reflect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub revision: u64,
    pub applications: Vec<JobApplication>,
}

/// Employer-side bookkeeping for a completed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub amount: Option<u32>,
}
