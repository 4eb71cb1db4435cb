//! The single home of the Shakti score weights. Any other copy of the formula is a bug.

use std::collections::BTreeSet;

use super::profile::{ExperienceBracket, VerificationStatus, WorkerProfile};
use super::{ScoreCategory, ScoreComponent};

pub(crate) const MAX_SCORE: u8 = 100;

const IDENTITY_CAP: u8 = 20;
const FULL_NAME_POINTS: u8 = 6;
const PHONE_POINTS: u8 = 6;
const EMAIL_POINTS: u8 = 3;
const PHOTO_POINTS: u8 = 3;
const DATE_OF_BIRTH_POINTS: u8 = 2;

const SKILLS_EXPERIENCE_CAP: u8 = 25;
const POINTS_PER_SKILL: u8 = 3;
const SKILLS_CAP: u8 = 15;

const LANGUAGES_CAP: u8 = 10;
const POINTS_PER_LANGUAGE: u8 = 4;

const LOCATION_CAP: u8 = 10;
const CITY_POINTS: u8 = 4;
const STATE_POINTS: u8 = 3;
const PINCODE_POINTS: u8 = 2;
const ADDRESS_POINTS: u8 = 1;

const PREFERENCES_CAP: u8 = 10;
const JOB_TYPES_POINTS: u8 = 4;
const AVAILABILITY_POINTS: u8 = 3;
const EXPECTED_WAGE_POINTS: u8 = 3;

const TRUST_CAP: u8 = 25;
const VERIFIED_POINTS: u8 = 10;
const VERIFICATION_PENDING_POINTS: u8 = 3;
const RATING_CAP: u8 = 10;
const COMPLETED_JOBS_CAP: u8 = 5;

fn points_if(present: bool, points: u8) -> u8 {
    if present {
        points
    } else {
        0
    }
}

/// Distinct non-blank entries, compared case-insensitively.
fn distinct_entries(values: &BTreeSet<String>) -> usize {
    values
        .iter()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .len()
}

fn per_item(count: usize, each: u8, cap: u8) -> u8 {
    let count = u8::try_from(count).unwrap_or(u8::MAX);
    count.saturating_mul(each).min(cap)
}

fn experience_points(bracket: ExperienceBracket) -> u8 {
    match bracket {
        ExperienceBracket::None => 0,
        ExperienceBracket::UnderOneYear => 2,
        ExperienceBracket::OneToThreeYears => 5,
        ExperienceBracket::ThreeToFiveYears => 8,
        ExperienceBracket::FivePlusYears => 10,
    }
}

fn component(category: ScoreCategory, points: u8, cap: u8, notes: String) -> ScoreComponent {
    ScoreComponent {
        category,
        points: points.min(cap),
        cap,
        notes,
    }
}

pub(crate) fn score_profile(profile: &WorkerProfile) -> Vec<ScoreComponent> {
    let mut components = Vec::with_capacity(6);

    let identity = &profile.identity;
    let identity_points = points_if(identity.has_full_name, FULL_NAME_POINTS)
        + points_if(identity.has_phone, PHONE_POINTS)
        + points_if(identity.has_email, EMAIL_POINTS)
        + points_if(identity.has_photo, PHOTO_POINTS)
        + points_if(identity.has_date_of_birth, DATE_OF_BIRTH_POINTS);
    components.push(component(
        ScoreCategory::Identity,
        identity_points,
        IDENTITY_CAP,
        "name, phone, email, photo and date of birth on file".to_string(),
    ));

    let skill_count = distinct_entries(&profile.skills);
    let skill_points = per_item(skill_count, POINTS_PER_SKILL, SKILLS_CAP);
    components.push(component(
        ScoreCategory::SkillsExperience,
        skill_points + experience_points(profile.experience),
        SKILLS_EXPERIENCE_CAP,
        format!("{skill_count} skill(s), experience {:?}", profile.experience),
    ));

    let language_count = distinct_entries(&profile.languages);
    components.push(component(
        ScoreCategory::Languages,
        per_item(language_count, POINTS_PER_LANGUAGE, LANGUAGES_CAP),
        LANGUAGES_CAP,
        format!("{language_count} language(s)"),
    ));

    let location = &profile.location;
    components.push(component(
        ScoreCategory::Location,
        points_if(location.has_city, CITY_POINTS)
            + points_if(location.has_state, STATE_POINTS)
            + points_if(location.has_pincode, PINCODE_POINTS)
            + points_if(location.has_address, ADDRESS_POINTS),
        LOCATION_CAP,
        "city, state, pincode and street address".to_string(),
    ));

    let preferences = &profile.preferences;
    let has_availability = preferences
        .availability
        .as_deref()
        .is_some_and(|availability| !availability.trim().is_empty());
    components.push(component(
        ScoreCategory::Preferences,
        points_if(distinct_entries(&preferences.job_types) > 0, JOB_TYPES_POINTS)
            + points_if(has_availability, AVAILABILITY_POINTS)
            + points_if(
                preferences.expected_wage.is_some_and(|wage| wage > 0),
                EXPECTED_WAGE_POINTS,
            ),
        PREFERENCES_CAP,
        "preferred job types, availability and expected wage".to_string(),
    ));

    let verification_points = match profile.verification {
        VerificationStatus::Verified => VERIFIED_POINTS,
        VerificationStatus::Pending => VERIFICATION_PENDING_POINTS,
        VerificationStatus::Unverified => 0,
    };
    let rating_points = rating_points(profile.rating.average, profile.rating.count);
    let job_points = u8::try_from(profile.completed_jobs)
        .unwrap_or(u8::MAX)
        .min(COMPLETED_JOBS_CAP);
    components.push(component(
        ScoreCategory::VerificationPerformance,
        verification_points + rating_points + job_points,
        TRUST_CAP,
        format!(
            "{:?}, rating {:.1} over {} review(s), {} completed job(s)",
            profile.verification,
            profile.rating.average,
            profile.rating.count,
            profile.completed_jobs
        ),
    ));

    components
}

/// Two points per star; unrated or malformed averages earn nothing.
fn rating_points(average: f32, count: u32) -> u8 {
    if count == 0 || !average.is_finite() {
        return 0;
    }
    let stars = average.clamp(0.0, 5.0);
    ((stars * 2.0).round() as u8).min(RATING_CAP)
}
