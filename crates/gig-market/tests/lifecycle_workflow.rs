//! End-to-end scenarios for the application lifecycle, driven through the public service facade and
//! the HTTP router.

mod common {
    use std::sync::Arc;

    use gig_market::marketplace::{
        Actor, ApplicationService, EmployerId, InMemoryStore, Job, NewJob, WorkerId,
    };

    pub(super) fn service() -> Arc<ApplicationService<InMemoryStore>> {
        Arc::new(ApplicationService::new(Arc::new(InMemoryStore::default())))
    }

    pub(super) fn employer_id() -> EmployerId {
        EmployerId("emp-patil".to_string())
    }

    pub(super) fn employer() -> Actor {
        Actor::Employer(employer_id())
    }

    pub(super) fn worker_id(name: &str) -> WorkerId {
        WorkerId(format!("wkr-{name}"))
    }

    pub(super) fn worker(name: &str) -> Actor {
        Actor::Worker(worker_id(name))
    }

    pub(super) fn open_job(
        service: &ApplicationService<InMemoryStore>,
        workers_needed: u32,
    ) -> Job {
        service
            .post_job(
                &employer_id(),
                NewJob {
                    title: "Harvest crew".to_string(),
                    company_name: Some("Patil Farms".to_string()),
                    location: Some("Nashik".to_string()),
                    salary: Some(500),
                    workers_needed,
                },
            )
            .expect("job posts")
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use gig_market::marketplace::{
    marketplace_router, ApplicationQuery, ApplicationServiceError, ApplicationStatus,
    InMemoryWorkerDirectory, JobStatus, PaymentStatus,
};
use tower::ServiceExt;

#[test]
fn duplicate_submission_is_rejected_while_first_is_live() {
    let service = service();
    let job = open_job(&service, 1);

    let first = service
        .submit(&job.id, &worker_id("sunita"))
        .expect("first submission");
    assert_eq!(first.status, ApplicationStatus::Pending);

    let second = service.submit(&job.id, &worker_id("sunita"));
    assert!(matches!(
        second,
        Err(ApplicationServiceError::DuplicateApplication { .. })
    ));
}

#[test]
fn accepting_and_selecting_moves_the_job_in_progress() {
    let service = service();
    let job = open_job(&service, 1);
    let application = service
        .submit(&job.id, &worker_id("sunita"))
        .expect("submit");

    let accepted = service
        .set_status(&application.id, ApplicationStatus::Accepted, &employer())
        .expect("accept");
    assert_eq!(accepted.status, ApplicationStatus::Accepted);

    let selected = service
        .select_final(&application.id, &employer())
        .expect("select");
    assert!(selected.is_final_selection);
    assert_eq!(
        service.job(&job.id).expect("job").status,
        JobStatus::InProgress
    );
}

#[test]
fn second_selection_on_the_same_job_fails() {
    let service = service();
    let job = open_job(&service, 2);
    let a = service.submit(&job.id, &worker_id("sunita")).expect("a");
    let b = service.submit(&job.id, &worker_id("deepak")).expect("b");
    for id in [&a.id, &b.id] {
        service
            .set_status(id, ApplicationStatus::Accepted, &employer())
            .expect("accept");
    }
    service.select_final(&a.id, &employer()).expect("select a");

    assert!(matches!(
        service.select_final(&b.id, &employer()),
        Err(ApplicationServiceError::AlreadySelected { .. })
    ));
    let finals = service
        .applications(&ApplicationQuery::for_job(job.id.clone()))
        .expect("snapshot")
        .applications
        .into_iter()
        .filter(|application| application.is_final_selection)
        .count();
    assert_eq!(finals, 1);
}

#[test]
fn cancel_succeeds_only_from_pending() {
    let service = service();
    let job = open_job(&service, 3);

    let pending = service.submit(&job.id, &worker_id("sunita")).expect("pending");
    assert_eq!(
        service
            .cancel(&pending.id, &worker("sunita"))
            .expect("cancel pending")
            .status,
        ApplicationStatus::Cancelled
    );

    let accepted = service.submit(&job.id, &worker_id("deepak")).expect("submit");
    service
        .set_status(&accepted.id, ApplicationStatus::Accepted, &employer())
        .expect("accept");
    assert!(matches!(
        service.cancel(&accepted.id, &worker("deepak")),
        Err(ApplicationServiceError::IllegalTransition {
            from: ApplicationStatus::Accepted,
            ..
        })
    ));

    let rejected = service.submit(&job.id, &worker_id("meera")).expect("submit");
    service
        .set_status(&rejected.id, ApplicationStatus::Rejected, &employer())
        .expect("reject");
    assert!(service.cancel(&rejected.id, &worker("meera")).is_err());
}

#[test]
fn completion_stamps_time_and_defaults_payment() {
    let service = service();
    let job = open_job(&service, 1);
    let application = service
        .submit(&job.id, &worker_id("sunita"))
        .expect("submit");
    service
        .set_status(&application.id, ApplicationStatus::Accepted, &employer())
        .expect("accept");
    service
        .select_final(&application.id, &employer())
        .expect("select");
    service
        .set_status(&application.id, ApplicationStatus::InProgress, &employer())
        .expect("start");

    let completed = service
        .mark_complete(&application.id, &employer())
        .expect("complete");
    assert_eq!(completed.status, ApplicationStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.payment_status, Some(PaymentStatus::Pending));
    completed.check_invariants().expect("invariants hold");
    assert_eq!(
        service.job(&job.id).expect("job").status,
        JobStatus::Completed
    );
}

#[test]
fn only_table_edges_are_reachable() {
    let service = service();
    let job = open_job(&service, 1);
    let application = service
        .submit(&job.id, &worker_id("sunita"))
        .expect("submit");

    for target in [
        ApplicationStatus::Pending,
        ApplicationStatus::InProgress,
        ApplicationStatus::Completed,
    ] {
        assert!(
            matches!(
                service.set_status(&application.id, target, &employer()),
                Err(ApplicationServiceError::IllegalTransition { .. })
            ),
            "pending -> {target} must be illegal"
        );
    }
    assert_eq!(
        service.get(&application.id).expect("get").status,
        ApplicationStatus::Pending
    );
}

#[tokio::test]
async fn http_walkthrough_from_application_to_payment() {
    let service = service();
    let job = open_job(&service, 1);
    let router = marketplace_router(
        Arc::clone(&service),
        Arc::new(InMemoryWorkerDirectory::default()),
    );

    let send = |method: &str, uri: String, role: &str, id: &str, body: Option<&str>| {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-actor-role", role)
            .header("x-actor-id", id)
            .header("content-type", "application/json");
        builder
            .body(body.map(|text| Body::from(text.to_string())).unwrap_or_default())
            .expect("request builds")
    };

    let submit_body = format!("{{\"job_id\":\"{}\"}}", job.id);
    let response = router
        .clone()
        .oneshot(send(
            "POST",
            "/api/v1/applications".to_string(),
            "worker",
            "wkr-sunita",
            Some(submit_body.as_str()),
        ))
        .await
        .expect("submit route");
    assert_eq!(response.status(), StatusCode::CREATED);
    let application = service
        .applications(&ApplicationQuery::for_worker(worker_id("sunita")))
        .expect("snapshot")
        .applications
        .remove(0);

    let steps = [
        ("PATCH", "status", Some("{\"status\":\"accepted\"}")),
        ("PATCH", "final-selection", None),
        ("PATCH", "status", Some("{\"status\":\"in_progress\"}")),
        ("POST", "complete", None),
        ("PATCH", "payment", Some("{\"status\":\"processing\",\"amount\":1500}")),
    ];
    for (method, action, body) in steps {
        let response = router
            .clone()
            .oneshot(send(
                method,
                format!("/api/v1/applications/{}/{action}", application.id),
                "employer",
                "emp-patil",
                body,
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK, "{method} {action}");
    }

    let stored = service.get(&application.id).expect("stored");
    assert_eq!(stored.status, ApplicationStatus::Completed);
    assert!(stored.is_final_selection);
    assert_eq!(stored.payment_status, Some(PaymentStatus::Processing));
    assert_eq!(stored.payment_amount, Some(1500));
}
