//! Legal application status changes and who may trigger them.

use super::domain::{ActorRole, ApplicationStatus};

/// Party allowed to drive a given status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Employer,
    Worker,
    Either,
}

impl Initiator {
    pub fn admits(self, role: ActorRole) -> bool {
        match self {
            Initiator::Either => true,
            Initiator::Employer => role == ActorRole::Employer,
            Initiator::Worker => role == ActorRole::Worker,
        }
    }
}

const TRANSITIONS: &[(ApplicationStatus, ApplicationStatus, Initiator)] = &[
    (ApplicationStatus::Pending, ApplicationStatus::Accepted, Initiator::Employer),
    (ApplicationStatus::Pending, ApplicationStatus::Rejected, Initiator::Employer),
    (ApplicationStatus::Pending, ApplicationStatus::Cancelled, Initiator::Worker),
    (ApplicationStatus::Accepted, ApplicationStatus::InProgress, Initiator::Employer),
    (ApplicationStatus::Accepted, ApplicationStatus::Rejected, Initiator::Employer),
    (ApplicationStatus::InProgress, ApplicationStatus::Completed, Initiator::Either),
];

/// Returns the initiator for `from -> to`, or `None` when the change is not in the table.
pub fn rule_for(from: ApplicationStatus, to: ApplicationStatus) -> Option<Initiator> {
    TRANSITIONS
        .iter()
        .find(|(source, target, _)| *source == from && *target == to)
        .map(|(_, _, initiator)| *initiator)
}

/// Verb used in error messages for an attempted move into `to`.
pub(crate) const fn action_for(to: ApplicationStatus) -> &'static str {
    match to {
        ApplicationStatus::Pending => "reopen",
        ApplicationStatus::Accepted => "accept",
        ApplicationStatus::Rejected => "reject",
        ApplicationStatus::InProgress => "start",
        ApplicationStatus::Completed => "complete",
        ApplicationStatus::Cancelled => "cancel",
    }
}
