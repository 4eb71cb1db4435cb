use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::domain::{InvariantViolation, Job};
use super::normalize::{application_from_payload, job_from_payload, ApplicationDraft, NormalizationError};
use super::repository::RepositoryError;

/// Normalized records ready for `ApplicationService::import`.
#[derive(Debug, Clone, Default)]
pub struct SeedBatch {
    pub jobs: Vec<Job>,
    pub applications: Vec<ApplicationDraft>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub jobs: usize,
    pub applications: usize,
}

#[derive(Debug, Deserialize)]
struct SeedDocument {
    #[serde(default)]
    jobs: Vec<Value>,
    #[serde(default)]
    applications: Vec<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("seed file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{kind} #{index} could not be normalized: {source}")]
    Record {
        kind: &'static str,
        index: usize,
        source: NormalizationError,
    },
    #[error("seed data breaks a marketplace invariant: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub fn load_seed_from_path<P: AsRef<Path>>(path: P) -> Result<SeedBatch, ImportError> {
    let file = File::open(path)?;
    load_seed(file)
}

/// Parse `{ "jobs": [...], "applications": [...] }`, normalizing each record.
pub fn load_seed<R: Read>(reader: R) -> Result<SeedBatch, ImportError> {
    let document: SeedDocument = serde_json::from_reader(reader)?;

    let jobs = document
        .jobs
        .iter()
        .enumerate()
        .map(|(index, payload)| {
            job_from_payload(payload).map_err(|source| ImportError::Record {
                kind: "job",
                index,
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let applications = document
        .applications
        .iter()
        .enumerate()
        .map(|(index, payload)| {
            application_from_payload(payload).map_err(|source| ImportError::Record {
                kind: "application",
                index,
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SeedBatch { jobs, applications })
}
