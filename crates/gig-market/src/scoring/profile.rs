use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::marketplace::WorkerId;

/// Score-relevant snapshot of a worker profile. Owned by worker identity management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub worker_id: WorkerId,
    #[serde(default)]
    pub identity: IdentityDetails,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub experience: ExperienceBracket,
    #[serde(default)]
    pub languages: BTreeSet<String>,
    #[serde(default)]
    pub location: LocationDetails,
    #[serde(default)]
    pub preferences: WorkPreferences,
    #[serde(default)]
    pub verification: VerificationStatus,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub completed_jobs: u32,
}

impl WorkerProfile {
    /// A freshly registered worker with nothing filled in.
    pub fn empty(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            identity: IdentityDetails::default(),
            skills: BTreeSet::new(),
            experience: ExperienceBracket::default(),
            languages: BTreeSet::new(),
            location: LocationDetails::default(),
            preferences: WorkPreferences::default(),
            verification: VerificationStatus::default(),
            rating: Rating::default(),
            completed_jobs: 0,
        }
    }
}

/// Identity and contact completeness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityDetails {
    pub has_full_name: bool,
    pub has_phone: bool,
    pub has_email: bool,
    pub has_photo: bool,
    pub has_date_of_birth: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceBracket {
    #[default]
    None,
    UnderOneYear,
    OneToThreeYears,
    ThreeToFiveYears,
    FivePlusYears,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationDetails {
    pub has_address: bool,
    pub has_city: bool,
    pub has_state: bool,
    pub has_pincode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkPreferences {
    pub job_types: BTreeSet<String>,
    pub availability: Option<String>,
    pub expected_wage: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
}

/// Aggregate of employer ratings on a 0-5 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rating {
    pub average: f32,
    pub count: u32,
}
