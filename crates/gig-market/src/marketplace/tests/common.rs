use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::marketplace::{
    marketplace_router, Actor, ApplicationId, ApplicationQuery, ApplicationRepository,
    ApplicationService, ApplicationStatus, Clock, EmployerId, InMemoryStore,
    InMemoryWorkerDirectory, Job, JobApplication, JobId, JobRepository, NewJob, RepositoryError,
    WorkerId,
};

/// Clock that advances one minute per reading so `applied_at` orders by call sequence.
pub(super) struct SteppingClock {
    minutes: AtomicI64,
}

impl SteppingClock {
    pub(super) fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
            .single()
            .expect("valid base time")
    }
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self {
            minutes: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let step = self.minutes.fetch_add(1, Ordering::Relaxed);
        Self::base() + Duration::minutes(step)
    }
}

pub(super) fn build_service() -> (Arc<ApplicationService<InMemoryStore>>, InMemoryStore) {
    let store = InMemoryStore::default();
    let service = ApplicationService::with_clock(
        Arc::new(store.clone()),
        Arc::new(SteppingClock::default()),
    );
    (Arc::new(service), store)
}

pub(super) fn employer_id() -> EmployerId {
    EmployerId("emp-sharma".to_string())
}

pub(super) fn employer() -> Actor {
    Actor::Employer(employer_id())
}

pub(super) fn other_employer() -> Actor {
    Actor::Employer(EmployerId("emp-rival".to_string()))
}

pub(super) fn worker_id(name: &str) -> WorkerId {
    WorkerId(format!("wkr-{name}"))
}

pub(super) fn worker(name: &str) -> Actor {
    Actor::Worker(worker_id(name))
}

pub(super) fn posting(workers_needed: u32) -> NewJob {
    NewJob {
        title: "Site helper".to_string(),
        company_name: Some("Sharma Constructions".to_string()),
        location: Some("Pune, Maharashtra".to_string()),
        salary: Some(650),
        workers_needed,
    }
}

pub(super) fn post_job(service: &ApplicationService<InMemoryStore>) -> Job {
    service
        .post_job(&employer_id(), posting(1))
        .expect("job posts")
}

pub(super) fn apply(
    service: &ApplicationService<InMemoryStore>,
    job: &JobId,
    name: &str,
) -> JobApplication {
    service
        .submit(job, &worker_id(name))
        .expect("application submits")
}

/// Walk an application to `in-progress` with the final selection held.
pub(super) fn hire(
    service: &ApplicationService<InMemoryStore>,
    job: &JobId,
    name: &str,
) -> JobApplication {
    let application = apply(service, job, name);
    service
        .set_status(&application.id, ApplicationStatus::Accepted, &employer())
        .expect("accept");
    service
        .select_final(&application.id, &employer())
        .expect("select");
    service
        .set_status(&application.id, ApplicationStatus::InProgress, &employer())
        .expect("start")
}

pub(super) fn all_applications(store: &InMemoryStore) -> Vec<JobApplication> {
    store
        .list(&ApplicationQuery::default())
        .expect("list succeeds")
}

/// Store whose every call fails, as when the database is unreachable.
pub(super) struct UnavailableStore;

impl ApplicationRepository for UnavailableStore {
    fn insert(&self, _application: JobApplication) -> Result<JobApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _application: JobApplication) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<JobApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _query: &ApplicationQuery) -> Result<Vec<JobApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn revision(&self) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl JobRepository for UnavailableStore {
    fn insert_job(&self, _job: Job) -> Result<Job, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_job(&self, _job: Job) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_job(&self, _id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_service(
    service: Arc<ApplicationService<InMemoryStore>>,
) -> (axum::Router, Arc<InMemoryWorkerDirectory>) {
    let workers = Arc::new(InMemoryWorkerDirectory::default());
    (marketplace_router(service, workers.clone()), workers)
}

pub(super) fn request(
    method: &str,
    uri: &str,
    actor: Option<&Actor>,
    body: Option<Value>,
) -> Request<axum::body::Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        let (role, id) = match actor {
            Actor::Worker(worker) => ("worker", worker.0.clone()),
            Actor::Employer(employer) => ("employer", employer.0.clone()),
        };
        builder = builder
            .header("x-actor-role", role)
            .header("x-actor-id", id);
    }
    match body {
        Some(body) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(
                serde_json::to_vec(&body).expect("serialize body"),
            ))
            .expect("request builds"),
        None => builder
            .body(axum::body::Body::empty())
            .expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn assert_error(response: Response, status: StatusCode, kind: &str) {
    assert_eq!(response.status(), status);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], kind, "{payload}");
}
