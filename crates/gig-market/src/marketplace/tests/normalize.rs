use serde_json::json;

use crate::marketplace::{
    application_from_payload, job_from_payload, new_job_from_payload, ApplicationStatus,
    EmployerId, InvariantViolation, JobStatus, NormalizationError, PaymentStatus,
};

#[test]
fn job_aliases_map_to_one_shape() {
    let camel = json!({
        "id": "job-1",
        "employerId": "emp-1",
        "title": "Mason",
        "companyName": "Sharma Constructions",
        "salary": 650,
        "location": "Pune",
        "workersNeeded": 2,
        "status": "active",
        "postedAt": "2025-02-01T08:00:00Z"
    });
    let legacy = json!({
        "_id": { "_id": "job-1" },
        "postedBy": { "id": "emp-1" },
        "jobTitle": "Mason",
        "businessName": "Sharma Constructions",
        "dailyWage": "₹650/day",
        "jobLocation": "Pune",
        "numberOfWorkers": "2",
        "status": "Active",
        "createdAt": 1_738_396_800_000_i64
    });

    let from_camel = job_from_payload(&camel).expect("camel payload");
    let from_legacy = job_from_payload(&legacy).expect("legacy payload");
    assert_eq!(from_camel, from_legacy);
    assert_eq!(from_camel.salary, Some(650));
    assert_eq!(from_camel.workers_needed, 2);
    assert_eq!(from_camel.employer_id, EmployerId("emp-1".to_string()));
}

#[test]
fn job_location_object_is_flattened() {
    let payload = json!({
        "title": "Helper",
        "location": { "city": "Nashik", "state": "Maharashtra", "pincode": 422001 }
    });
    let posting = new_job_from_payload(&payload).expect("posting");
    assert_eq!(posting.location.as_deref(), Some("Nashik, Maharashtra, 422001"));
    assert_eq!(posting.workers_needed, 1);
    assert_eq!(posting.salary, None);
}

#[test]
fn salary_text_with_grouping_is_parsed() {
    let payload = json!({ "title": "Driver", "pay": "Rs. 1,200 per day" });
    let posting = new_job_from_payload(&payload).expect("posting");
    assert_eq!(posting.salary, Some(1200));
}

#[test]
fn job_without_title_is_rejected() {
    assert_eq!(
        new_job_from_payload(&json!({ "salary": 500 })),
        Err(NormalizationError::MissingField("title"))
    );
    assert_eq!(
        new_job_from_payload(&json!(["not", "an", "object"])),
        Err(NormalizationError::NotAnObject)
    );
}

#[test]
fn job_status_spellings_normalize() {
    let payload = json!({
        "id": "job-2",
        "employer": "emp-1",
        "title": "Cook",
        "jobStatus": "In Progress",
        "created_at": "2025-02-01T08:00:00+05:30"
    });
    let job = job_from_payload(&payload).expect("job");
    assert_eq!(job.status, JobStatus::InProgress);
}

#[test]
fn application_status_spellings_normalize() {
    for raw in ["in-progress", "in_progress", "inProgress", "In Progress"] {
        let payload = json!({
            "id": "app-1",
            "jobId": "job-1",
            "workerId": "wkr-1",
            "status": raw,
            "appliedAt": "2025-02-02T08:00:00Z"
        });
        let draft = application_from_payload(&payload).expect("draft");
        assert_eq!(draft.status, ApplicationStatus::InProgress, "{raw}");
    }
}

#[test]
fn application_payment_fields_are_optional() {
    let payload = json!({
        "_id": "app-9",
        "job": { "_id": "job-1" },
        "applicant": "wkr-7",
        "applicationStatus": "completed",
        "applied_at": "2025-02-02T08:00:00Z",
        "completedAt": "2025-02-05T18:00:00Z",
        "paymentStatus": "paid",
        "amount": "₹2,600",
        "paidAt": "2025-02-06T10:00:00Z",
        "finalSelection": "yes"
    });
    let draft = application_from_payload(&payload).expect("draft");
    assert_eq!(draft.job_id.0, "job-1");
    assert_eq!(draft.worker_id.0, "wkr-7");
    assert_eq!(draft.payment_status, Some(PaymentStatus::Paid));
    assert_eq!(draft.payment_amount, Some(2600));
    assert!(draft.payment_date.is_some());
    assert!(draft.is_final_selection);

    let application = draft
        .into_application(EmployerId("emp-1".to_string()))
        .expect("employer resolves");
    application.check_invariants().expect("consistent record");
}

#[test]
fn unknown_application_status_is_reported() {
    let payload = json!({
        "id": "app-1",
        "jobId": "job-1",
        "workerId": "wkr-1",
        "status": "hired",
        "appliedAt": "2025-02-02T08:00:00Z"
    });
    assert_eq!(
        application_from_payload(&payload),
        Err(NormalizationError::InvalidValue {
            field: "status",
            value: "hired".to_string(),
        })
    );
}

#[test]
fn declared_employer_must_match_the_job() {
    let payload = json!({
        "id": "app-1",
        "jobId": "job-1",
        "workerId": "wkr-1",
        "employerId": "emp-2",
        "appliedAt": "2025-02-02T08:00:00Z"
    });
    let draft = application_from_payload(&payload).expect("draft");
    assert!(matches!(
        draft.into_application(EmployerId("emp-1".to_string())),
        Err(InvariantViolation::EmployerMismatch { .. })
    ));
}
