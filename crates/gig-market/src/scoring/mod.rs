//! Shakti score: a display-only trust and completeness metric for worker profiles.
//!
//! The score is a pure function of the profile snapshot and is recomputed on every read. It never
//! gates whether a worker may apply.

mod profile;
mod rules;

pub use profile::{
    ExperienceBracket, IdentityDetails, LocationDetails, Rating, VerificationStatus,
    WorkPreferences, WorkerProfile,
};

use serde::{Deserialize, Serialize};

use crate::marketplace::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Identity,
    SkillsExperience,
    Languages,
    Location,
    Preferences,
    VerificationPerformance,
}

/// Points earned in one category, already limited to that category's cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub category: ScoreCategory,
    pub points: u8,
    pub cap: u8,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: u8,
    pub components: Vec<ScoreComponent>,
}

/// Score a profile into `0..=100`.
pub fn compute_score(profile: &WorkerProfile) -> u8 {
    score_breakdown(profile).total
}

pub fn score_breakdown(profile: &WorkerProfile) -> ScoreBreakdown {
    let components = rules::score_profile(profile);
    let total = components
        .iter()
        .map(|component| u16::from(component.points))
        .sum::<u16>()
        .min(u16::from(rules::MAX_SCORE)) as u8;
    ScoreBreakdown { total, components }
}

/// Response shape for `GET worker.score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerScoreView {
    pub worker_id: WorkerId,
    pub score: u8,
    pub components: Vec<ScoreComponent>,
}

impl WorkerScoreView {
    pub fn from_profile(profile: &WorkerProfile) -> Self {
        let breakdown = score_breakdown(profile);
        Self {
            worker_id: profile.worker_id.clone(),
            score: breakdown.total,
            components: breakdown.components,
        }
    }
}
