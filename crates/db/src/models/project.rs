//! Project aggregate rows.

use chrono::NaiveDate;
use roster_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A project row from the `projects` table.
///
/// `status` holds one of the `roster_core::project_status` column values.
/// A non-null `deleted_at` marks a cancelled, tombstoned project.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub abbreviation: Option<String>,
    pub team_id: Option<DbId>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Project {
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// DTO for creating a new project.
///
/// `leader_id` and `member_ids` are applied by the project coordinator
/// after the row insert; both require `team_id` to be set, since the
/// initial roster is drawn from the owning team's active members.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub abbreviation: Option<String>,
    pub team_id: Option<DbId>,
    pub leader_id: Option<DbId>,
    #[serde(default)]
    pub member_ids: Vec<DbId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
