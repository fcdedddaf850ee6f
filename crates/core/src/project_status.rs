//! Project status machine.
//!
//! Projects move through `PLANNING -> IN_PROGRESS -> COMPLETED`, may be
//! parked in `ON_HOLD` from either working state, and may be cancelled from
//! any non-terminal state. `COMPLETED` and `CANCELLED` are terminal and
//! irreversible.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const PROJECT_PLANNING: &str = "PLANNING";
pub const PROJECT_IN_PROGRESS: &str = "IN_PROGRESS";
pub const PROJECT_ON_HOLD: &str = "ON_HOLD";
pub const PROJECT_COMPLETED: &str = "COMPLETED";
pub const PROJECT_CANCELLED: &str = "CANCELLED";

/// All valid project status column values.
pub const VALID_PROJECT_STATUSES: &[&str] = &[
    PROJECT_PLANNING,
    PROJECT_IN_PROGRESS,
    PROJECT_ON_HOLD,
    PROJECT_COMPLETED,
    PROJECT_CANCELLED,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Planning,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Planning => PROJECT_PLANNING,
            ProjectStatus::InProgress => PROJECT_IN_PROGRESS,
            ProjectStatus::OnHold => PROJECT_ON_HOLD,
            ProjectStatus::Completed => PROJECT_COMPLETED,
            ProjectStatus::Cancelled => PROJECT_CANCELLED,
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            PROJECT_PLANNING => Ok(ProjectStatus::Planning),
            PROJECT_IN_PROGRESS => Ok(ProjectStatus::InProgress),
            PROJECT_ON_HOLD => Ok(ProjectStatus::OnHold),
            PROJECT_COMPLETED => Ok(ProjectStatus::Completed),
            PROJECT_CANCELLED => Ok(ProjectStatus::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Invalid project status '{other}'. Must be one of: {}",
                VALID_PROJECT_STATUSES.join(", ")
            ))),
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }

    /// Whether `self -> to` is an allowed transition.
    pub fn can_transition_to(self, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        match (self, to) {
            // Cancellation is reachable from any non-terminal state.
            (from, Cancelled) => !from.is_terminal(),
            (Planning, InProgress) | (Planning, OnHold) => true,
            (InProgress, OnHold) | (InProgress, Completed) => true,
            (OnHold, Planning) | (OnHold, InProgress) => true,
            _ => false,
        }
    }
}

/// Validate a status transition, producing a `Conflict` with a reason
/// suitable for direct display when the transition is not allowed.
pub fn validate_transition(from: ProjectStatus, to: ProjectStatus) -> Result<(), CoreError> {
    if from == to {
        return Err(CoreError::conflict(format!(
            "project is already {}",
            from.as_str()
        )));
    }
    if from.is_terminal() {
        return Err(CoreError::conflict(format!(
            "project is already {} and cannot change status",
            from.as_str()
        )));
    }
    if !from.can_transition_to(to) {
        return Err(CoreError::conflict(format!(
            "cannot move project from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }
    Ok(())
}
