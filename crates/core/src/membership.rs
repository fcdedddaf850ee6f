//! Membership interval status values.
//!
//! These must match the CHECK constraint on the `team_members` and
//! `project_members` tables.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status column value for an open membership interval.
pub const MEMBERSHIP_ACTIVE: &str = "ACTIVE";

/// Status column value for a closed membership interval.
pub const MEMBERSHIP_INACTIVE: &str = "INACTIVE";

/// Status of a membership interval.
///
/// An interval is created `Active` and transitions to `Inactive` exactly
/// once, in the same mutation that stamps `left_at`. It is never re-opened;
/// a rejoin creates a new interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipStatus {
    Active,
    Inactive,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => MEMBERSHIP_ACTIVE,
            MembershipStatus::Inactive => MEMBERSHIP_INACTIVE,
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            MEMBERSHIP_ACTIVE => Ok(MembershipStatus::Active),
            MEMBERSHIP_INACTIVE => Ok(MembershipStatus::Inactive),
            other => Err(CoreError::Validation(format!(
                "Invalid membership status '{other}'. Must be one of: {MEMBERSHIP_ACTIVE}, {MEMBERSHIP_INACTIVE}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!(
            MembershipStatus::parse(MembershipStatus::Active.as_str()).unwrap(),
            MembershipStatus::Active
        );
        assert_eq!(
            MembershipStatus::parse(MembershipStatus::Inactive.as_str()).unwrap(),
            MembershipStatus::Inactive
        );
    }

    #[test]
    fn unknown_status_rejected() {
        let err = MembershipStatus::parse("PAUSED").unwrap_err();
        assert!(err.to_string().contains("Invalid membership status"));
    }
}
