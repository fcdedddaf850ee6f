//! Leadership interval rows.

use roster_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One continuous period during which a user leads a container.
///
/// Shared row shape for `team_leadership_history` and
/// `project_leadership_history`. At most one interval per container has
/// `ended_at` null; a leader change closes the open interval and opens the
/// next one in the same transaction.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeadershipInterval {
    pub id: DbId,
    pub leader_id: DbId,
    pub container_id: DbId,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
}

impl LeadershipInterval {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}
