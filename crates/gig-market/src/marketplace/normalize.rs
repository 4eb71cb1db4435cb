//! Boundary mapping from the loosely shaped JSON older clients send to the canonical model.
//!
//! Field aliases live in one table per field so consumers never probe for alternates themselves.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::domain::{
    ApplicationId, ApplicationStatus, EmployerId, InvariantViolation, Job, JobApplication, JobId,
    JobStatus, NewJob, PaymentStatus, WorkerId,
};

const RECORD_ID_KEYS: &[&str] = &["id", "_id"];
const JOB_ID_KEYS: &[&str] = &["id", "_id", "jobId", "job_id"];
const EMPLOYER_KEYS: &[&str] = &["employerId", "employer_id", "employer", "postedBy", "posted_by"];
const TITLE_KEYS: &[&str] = &["title", "jobTitle", "job_title", "name"];
const COMPANY_KEYS: &[&str] = &[
    "companyName",
    "company_name",
    "company",
    "employerName",
    "employer_name",
    "businessName",
    "business_name",
];
const SALARY_KEYS: &[&str] = &[
    "salary",
    "wage",
    "dailyWage",
    "daily_wage",
    "pay",
    "payment",
    "budget",
];
const LOCATION_KEYS: &[&str] = &["location", "jobLocation", "job_location", "address", "city"];
const LOCATION_PARTS: &[&str] = &["address", "area", "city", "district", "state", "pincode"];
const WORKERS_KEYS: &[&str] = &[
    "workersNeeded",
    "workers_needed",
    "numberOfWorkers",
    "number_of_workers",
    "positions",
    "vacancies",
];
const JOB_STATUS_KEYS: &[&str] = &["status", "jobStatus", "job_status"];
const POSTED_KEYS: &[&str] = &["postedAt", "posted_at", "createdAt", "created_at"];

const APPLICATION_ID_KEYS: &[&str] = &["id", "_id", "applicationId", "application_id"];
const APPLICATION_JOB_KEYS: &[&str] = &["jobId", "job_id", "job"];
const WORKER_KEYS: &[&str] = &["workerId", "worker_id", "worker", "applicantId", "applicant"];
const APPLICATION_STATUS_KEYS: &[&str] = &["status", "applicationStatus", "application_status"];
const APPLIED_KEYS: &[&str] = &["appliedAt", "applied_at", "createdAt", "created_at"];
const FINAL_KEYS: &[&str] = &[
    "isFinalSelection",
    "is_final_selection",
    "finalSelection",
    "final_selection",
];
const PAYMENT_STATUS_KEYS: &[&str] = &["paymentStatus", "payment_status"];
const PAYMENT_AMOUNT_KEYS: &[&str] = &["paymentAmount", "payment_amount", "amount"];
const PAYMENT_DATE_KEYS: &[&str] = &["paymentDate", "payment_date", "paidAt", "paid_at"];
const COMPLETED_KEYS: &[&str] = &["completedAt", "completed_at"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` has an unusable value: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Canonical application record whose employer may still need to be resolved from its job.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDraft {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub employer_id: Option<EmployerId>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub is_final_selection: bool,
    pub payment_status: Option<PaymentStatus>,
    pub payment_amount: Option<u32>,
    pub payment_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ApplicationDraft {
    pub fn into_application(
        self,
        employer_id: EmployerId,
    ) -> Result<JobApplication, InvariantViolation> {
        if let Some(declared) = &self.employer_id {
            if *declared != employer_id {
                return Err(InvariantViolation::EmployerMismatch {
                    application_id: self.id,
                    job_id: self.job_id,
                });
            }
        }
        Ok(JobApplication {
            id: self.id,
            job_id: self.job_id,
            worker_id: self.worker_id,
            employer_id,
            status: self.status,
            applied_at: self.applied_at,
            is_final_selection: self.is_final_selection,
            payment_status: self.payment_status,
            payment_amount: self.payment_amount,
            payment_date: self.payment_date,
            completed_at: self.completed_at,
        })
    }
}

/// Map a job-posting payload to the fields an employer controls.
pub fn new_job_from_payload(payload: &Value) -> Result<NewJob, NormalizationError> {
    let object = payload.as_object().ok_or(NormalizationError::NotAnObject)?;

    let title = text_field(object, TITLE_KEYS).ok_or(NormalizationError::MissingField("title"))?;
    let company_name = text_field(object, COMPANY_KEYS);
    let location = location_field(object);
    let salary = match first_present(object, SALARY_KEYS) {
        Some(value) => parse_amount(value, "salary")?,
        None => None,
    };
    let workers_needed = match first_present(object, WORKERS_KEYS) {
        Some(value) => parse_count(value, "workers_needed")?,
        None => 1,
    };

    Ok(NewJob {
        title,
        company_name,
        location,
        salary,
        workers_needed,
    })
}

/// Map a stored job record, including identity and lifecycle fields.
pub fn job_from_payload(payload: &Value) -> Result<Job, NormalizationError> {
    let object = payload.as_object().ok_or(NormalizationError::NotAnObject)?;
    let posting = new_job_from_payload(payload)?;

    let id = id_field(object, JOB_ID_KEYS).ok_or(NormalizationError::MissingField("id"))?;
    let employer_id = id_field(object, EMPLOYER_KEYS)
        .ok_or(NormalizationError::MissingField("employer_id"))?;
    let status = match text_field(object, JOB_STATUS_KEYS) {
        Some(raw) => JobStatus::parse_label(&raw).ok_or(NormalizationError::InvalidValue {
            field: "status",
            value: raw,
        })?,
        None => JobStatus::Active,
    };
    let posted_at = match first_present(object, POSTED_KEYS) {
        Some(value) => parse_timestamp(value, "posted_at")?,
        None => return Err(NormalizationError::MissingField("posted_at")),
    };

    Ok(Job {
        id: JobId(id),
        employer_id: EmployerId(employer_id),
        title: posting.title,
        company_name: posting.company_name,
        location: posting.location,
        salary: posting.salary,
        workers_needed: posting.workers_needed,
        status,
        posted_at,
    })
}

pub fn application_from_payload(payload: &Value) -> Result<ApplicationDraft, NormalizationError> {
    let object = payload.as_object().ok_or(NormalizationError::NotAnObject)?;

    let id = id_field(object, APPLICATION_ID_KEYS).ok_or(NormalizationError::MissingField("id"))?;
    let job_id =
        id_field(object, APPLICATION_JOB_KEYS).ok_or(NormalizationError::MissingField("job_id"))?;
    let worker_id =
        id_field(object, WORKER_KEYS).ok_or(NormalizationError::MissingField("worker_id"))?;
    let employer_id = id_field(object, EMPLOYER_KEYS).map(EmployerId);

    let status = match text_field(object, APPLICATION_STATUS_KEYS) {
        Some(raw) => {
            ApplicationStatus::parse_label(&raw).ok_or(NormalizationError::InvalidValue {
                field: "status",
                value: raw,
            })?
        }
        None => ApplicationStatus::Pending,
    };
    let applied_at = match first_present(object, APPLIED_KEYS) {
        Some(value) => parse_timestamp(value, "applied_at")?,
        None => return Err(NormalizationError::MissingField("applied_at")),
    };
    let is_final_selection = match first_present(object, FINAL_KEYS) {
        Some(value) => parse_flag(value, "is_final_selection")?,
        None => false,
    };
    let payment_status = match text_field(object, PAYMENT_STATUS_KEYS) {
        Some(raw) => Some(PaymentStatus::parse_label(&raw).ok_or(
            NormalizationError::InvalidValue {
                field: "payment_status",
                value: raw,
            },
        )?),
        None => None,
    };
    let payment_amount = match first_present(object, PAYMENT_AMOUNT_KEYS) {
        Some(value) => parse_amount(value, "payment_amount")?,
        None => None,
    };
    let payment_date = optional_timestamp(object, PAYMENT_DATE_KEYS, "payment_date")?;
    let completed_at = optional_timestamp(object, COMPLETED_KEYS, "completed_at")?;

    Ok(ApplicationDraft {
        id: ApplicationId(id),
        job_id: JobId(job_id),
        worker_id: WorkerId(worker_id),
        employer_id,
        status,
        applied_at,
        is_final_selection,
        payment_status,
        payment_amount,
        payment_date,
        completed_at,
    })
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Identifiers arrive as strings, numbers, or embedded documents carrying `id`/`_id`.
fn id_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(id_value)
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Object(nested) => RECORD_ID_KEYS
            .iter()
            .filter_map(|key| nested.get(*key))
            .find_map(id_value),
        _ => None,
    }
}

fn location_field(object: &Map<String, Value>) -> Option<String> {
    for key in LOCATION_KEYS {
        match object.get(*key) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                return Some(text.trim().to_string())
            }
            Some(Value::Object(parts)) => {
                let joined = LOCATION_PARTS
                    .iter()
                    .filter_map(|part| parts.get(*part))
                    .filter_map(|value| match value {
                        Value::String(text) => Some(text.trim().to_string()),
                        Value::Number(number) => Some(number.to_string()),
                        _ => None,
                    })
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whole currency units from a number or from text such as `"₹650/day"` or `"1,200"`.
fn parse_amount(value: &Value, field: &'static str) -> Result<Option<u32>, NormalizationError> {
    let invalid = || NormalizationError::InvalidValue {
        field,
        value: value.to_string(),
    };
    match value {
        Value::Number(number) => {
            let amount = number.as_f64().ok_or_else(invalid)?;
            if !(0.0..=u32::MAX as f64).contains(&amount) {
                return Err(invalid());
            }
            Ok(Some(amount.round() as u32))
        }
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            let digits: String = text
                .chars()
                .skip_while(|ch| !ch.is_ascii_digit())
                .take_while(|ch| ch.is_ascii_digit() || *ch == ',')
                .filter(char::is_ascii_digit)
                .collect();
            if digits.is_empty() {
                return Err(invalid());
            }
            digits.parse::<u32>().map(Some).map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

fn parse_count(value: &Value, field: &'static str) -> Result<u32, NormalizationError> {
    let invalid = || NormalizationError::InvalidValue {
        field,
        value: value.to_string(),
    };
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(invalid),
        Value::String(text) => text.trim().parse::<u32>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_flag(value: &Value, field: &'static str) -> Result<bool, NormalizationError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            _ => Err(NormalizationError::InvalidValue {
                field,
                value: value.to_string(),
            }),
        },
        Value::Number(number) => Ok(number.as_u64().unwrap_or(0) != 0),
        _ => Err(NormalizationError::InvalidValue {
            field,
            value: value.to_string(),
        }),
    }
}

/// RFC 3339 text or epoch milliseconds.
fn parse_timestamp(value: &Value, field: &'static str) -> Result<DateTime<Utc>, NormalizationError> {
    let parsed = match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|stamp| stamp.with_timezone(&Utc)),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.ok_or_else(|| NormalizationError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn optional_timestamp(
    object: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, NormalizationError> {
    first_present(object, keys)
        .map(|value| parse_timestamp(value, field))
        .transpose()
}
