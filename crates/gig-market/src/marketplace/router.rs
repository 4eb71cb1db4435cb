use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationQuery, ApplicationStatus, EmployerId, JobId,
    PaymentStatus, PaymentUpdate, WorkerId,
};
use super::normalize::new_job_from_payload;
use super::repository::{ApplicationRepository, JobRepository, RepositoryError, WorkerDirectory};
use super::service::{ApplicationService, ApplicationServiceError};
use crate::scoring::{WorkerProfile, WorkerScoreView};

pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Shared handles behind every marketplace route.
pub struct MarketplaceState<R, W> {
    pub service: Arc<ApplicationService<R>>,
    pub workers: Arc<W>,
}

impl<R, W> Clone for MarketplaceState<R, W> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            workers: Arc::clone(&self.workers),
        }
    }
}

/// Router exposing job posting, the application lifecycle, dashboard reads and worker scores.
pub fn marketplace_router<R, W>(service: Arc<ApplicationService<R>>, workers: Arc<W>) -> Router
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    Router::new()
        .route("/api/v1/jobs", post(post_job_handler::<R, W>))
        .route("/api/v1/jobs/:job_id", get(job_handler::<R, W>))
        .route("/api/v1/jobs/:job_id/close", post(close_job_handler::<R, W>))
        .route(
            "/api/v1/applications",
            post(submit_handler::<R, W>).get(list_handler::<R, W>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<R, W>).delete(cancel_handler::<R, W>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            patch(status_handler::<R, W>),
        )
        .route(
            "/api/v1/applications/:application_id/final-selection",
            patch(final_selection_handler::<R, W>),
        )
        .route(
            "/api/v1/applications/:application_id/complete",
            post(complete_handler::<R, W>),
        )
        .route(
            "/api/v1/applications/:application_id/payment",
            patch(payment_handler::<R, W>),
        )
        .route(
            "/api/v1/workers/:worker_id/score",
            get(score_handler::<R, W>),
        )
        .route(
            "/api/v1/workers/:worker_id/profile",
            put(profile_handler::<R, W>),
        )
        .with_state(MarketplaceState { service, workers })
}

fn error_body(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": kind,
        "message": message.into(),
    });
    (status, Json(payload)).into_response()
}

impl IntoResponse for ApplicationServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApplicationServiceError::DuplicateApplication { .. }
            | ApplicationServiceError::AlreadySelected { .. }
            | ApplicationServiceError::JobNotOpen { .. } => StatusCode::CONFLICT,
            ApplicationServiceError::IllegalTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApplicationServiceError::NotFound(_) | ApplicationServiceError::JobNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApplicationServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApplicationServiceError::InvalidJob(_) | ApplicationServiceError::InvalidPayment(_) => {
                StatusCode::BAD_REQUEST
            }
            ApplicationServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            ApplicationServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_body(status, self.kind(), self.to_string())
    }
}

/// Identity is asserted by the caller; there is no authentication behind it.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let unauthenticated = |message: &str| {
        error_body(StatusCode::UNAUTHORIZED, "unauthenticated", message.to_string())
    };

    let role = header_text(ACTOR_ROLE_HEADER)
        .ok_or_else(|| unauthenticated("missing x-actor-role header"))?;
    let id = header_text(ACTOR_ID_HEADER)
        .ok_or_else(|| unauthenticated("missing x-actor-id header"))?
        .to_string();
    match role.to_ascii_lowercase().as_str() {
        "worker" => Ok(Actor::Worker(WorkerId(id))),
        "employer" => Ok(Actor::Employer(EmployerId(id))),
        other => Err(unauthenticated(&format!("unknown actor role `{other}`"))),
    }
}

fn revision_tag(revision: u64) -> String {
    format!("\"rev-{revision}\"")
}

fn etag_matches(headers: &HeaderMap, tag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|raw| raw.split(',').any(|candidate| candidate.trim() == tag))
        .unwrap_or(false)
}

fn with_etag(mut response: Response, tag: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(tag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

pub(crate) async fn post_job_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let Actor::Employer(employer_id) = actor else {
        return ApplicationServiceError::Forbidden {
            role: ActorRole::Worker,
            action: "post_job",
        }
        .into_response();
    };
    let posting = match new_job_from_payload(&payload) {
        Ok(posting) => posting,
        Err(error) => {
            return error_body(StatusCode::BAD_REQUEST, "invalid_payload", error.to_string())
        }
    };
    match state.service.post_job(&employer_id, posting) {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn job_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(job_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    match state.service.job(&JobId(job_id)) {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn close_job_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match state.service.close_job(&JobId(job_id), &actor) {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(alias = "jobId")]
    pub(crate) job_id: String,
}

pub(crate) async fn submit_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    headers: HeaderMap,
    Json(request): Json<SubmitRequest>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let Actor::Worker(worker_id) = actor else {
        return ApplicationServiceError::Forbidden {
            role: ActorRole::Employer,
            action: "apply",
        }
        .into_response();
    };
    match state.service.submit(&JobId(request.job_id), &worker_id) {
        Ok(application) => (StatusCode::CREATED, Json(application)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    pub(crate) worker: Option<String>,
    pub(crate) job: Option<String>,
    pub(crate) status: Option<String>,
}

pub(crate) async fn list_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let status = match params.status.as_deref().filter(|raw| !raw.trim().is_empty()) {
        None => None,
        Some(raw) => match ApplicationStatus::parse_label(raw) {
            Some(status) => Some(status),
            None => {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "invalid_status",
                    format!("unknown application status `{raw}`"),
                )
            }
        },
    };
    let query = ApplicationQuery {
        worker_id: params.worker.map(WorkerId),
        job_id: params.job.map(JobId),
        status,
    };

    let current = match state.service.revision() {
        Ok(revision) => revision_tag(revision),
        Err(error) => return error.into_response(),
    };
    if etag_matches(&headers, &current) {
        debug!(etag = %current, "application list not modified");
        return with_etag(StatusCode::NOT_MODIFIED.into_response(), &current);
    }

    match state.service.applications(&query) {
        Ok(snapshot) => {
            let tag = revision_tag(snapshot.revision);
            with_etag((StatusCode::OK, Json(snapshot)).into_response(), &tag)
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn application_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    match state.service.get(&ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub(crate) status: String,
}

pub(crate) async fn status_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<StatusRequest>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let Some(target) = ApplicationStatus::parse_label(&request.status) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            format!("unknown application status `{}`", request.status),
        );
    };
    match state
        .service
        .set_status(&ApplicationId(application_id), target, &actor)
    {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn cancel_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match state.service.cancel(&ApplicationId(application_id), &actor) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn final_selection_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match state
        .service
        .select_final(&ApplicationId(application_id), &actor)
    {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn complete_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match state
        .service
        .mark_complete(&ApplicationId(application_id), &actor)
    {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) amount: Option<u32>,
}

pub(crate) async fn payment_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let Some(status) = PaymentStatus::parse_label(&request.status) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "invalid_payment",
            format!("unknown payment status `{}`", request.status),
        );
    };
    let update = PaymentUpdate {
        status,
        amount: request.amount,
    };
    match state
        .service
        .update_payment(&ApplicationId(application_id), update, &actor)
    {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn score_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(worker_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    let worker_id = WorkerId(worker_id);
    match state.workers.profile(&worker_id) {
        Ok(Some(profile)) => (StatusCode::OK, Json(WorkerScoreView::from_profile(&profile)))
            .into_response(),
        Ok(None) => error_body(
            StatusCode::NOT_FOUND,
            "worker_not_found",
            format!("worker {worker_id} has no profile"),
        ),
        Err(error) => ApplicationServiceError::from(error).into_response(),
    }
}

pub(crate) async fn profile_handler<R, W>(
    State(state): State<MarketplaceState<R, W>>,
    Path(worker_id): Path<String>,
    Json(mut payload): Json<Value>,
) -> Response
where
    R: ApplicationRepository + JobRepository + 'static,
    W: WorkerDirectory + 'static,
{
    // The path wins over whatever id the body carries.
    if let Some(object) = payload.as_object_mut() {
        object.insert("worker_id".to_string(), Value::String(worker_id));
    }
    let profile: WorkerProfile = match serde_json::from_value(payload) {
        Ok(profile) => profile,
        Err(error) => {
            return error_body(StatusCode::BAD_REQUEST, "invalid_payload", error.to_string())
        }
    };
    let view = WorkerScoreView::from_profile(&profile);
    match state.workers.upsert_profile(profile) {
        Ok(()) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => ApplicationServiceError::from(error).into_response(),
    }
}
