//! Membership interval rows.

use roster_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One continuous period during which a user is an active member of a
/// container (team or project).
///
/// Shared row shape for `team_members` and `project_members`; queries alias
/// the kind-specific foreign key column to `container_id`.
///
/// Invariants (enforced in code by the membership ledger, backed by partial
/// unique indexes):
/// - `left_at` is null exactly while `status` is ACTIVE.
/// - An interval is closed at most once and never re-opened.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MembershipInterval {
    pub id: DbId,
    pub user_id: DbId,
    pub container_id: DbId,
    pub status: String,
    pub joined_at: Timestamp,
    pub left_at: Option<Timestamp>,
}

impl MembershipInterval {
    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }
}
