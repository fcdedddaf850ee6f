//! PostgreSQL implementation of the store contract.
//!
//! One [`PgSession`] wraps one `sqlx` transaction. Aggregate lookups use
//! `SELECT ... FOR UPDATE` so concurrent mutations of the same aggregate
//! serialize at the row level; nothing is locked across transactions.

use async_trait::async_trait;
use roster_core::container::ContainerKind;
use roster_core::membership::MembershipStatus;
use roster_core::types::{DbId, Timestamp};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::leadership::LeadershipInterval;
use crate::models::membership::MembershipInterval;
use crate::models::project::{CreateProject, Project};
use crate::models::team::{CreateTeam, Team};
use crate::models::user::{CreateUser, User};
use crate::store::{Store, StoreError, StoreResult, StoreSession};

const USER_COLUMNS: &str = "id, name, email, created_at, updated_at, deleted_at";
const TEAM_COLUMNS: &str = "id, name, description, created_at, updated_at, deleted_at";
const PROJECT_COLUMNS: &str = "id, name, abbreviation, team_id, status, start_date, end_date, \
                               created_at, updated_at, deleted_at";

/// Membership table and container foreign-key column for a kind.
fn membership_table(kind: ContainerKind) -> (&'static str, &'static str) {
    match kind {
        ContainerKind::Team => ("team_members", "team_id"),
        ContainerKind::Project => ("project_members", "project_id"),
    }
}

/// Leadership table and container foreign-key column for a kind.
fn leadership_table(kind: ContainerKind) -> (&'static str, &'static str) {
    match kind {
        ContainerKind::Team => ("team_leadership_history", "team_id"),
        ContainerKind::Project => ("project_leadership_history", "project_id"),
    }
}

fn membership_columns(container_col: &str) -> String {
    format!("id, user_id, {container_col} AS container_id, status, joined_at, left_at")
}

fn leadership_columns(container_col: &str) -> String {
    format!("id, leader_id, {container_col} AS container_id, started_at, ended_at")
}

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreSession>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }
}

/// One open transaction.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreSession for PgSession {
    async fn user_by_id(&mut self, id: DbId) -> StoreResult<Option<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_user(&mut self, input: &CreateUser, now: Timestamp) -> StoreResult<User> {
        let query = format!(
            "INSERT INTO users (name, email, created_at, updated_at)
             VALUES ($1, $2, $3, $3)
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn team_for_update(&mut self, id: DbId) -> StoreResult<Option<Team>> {
        let query = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, Team>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn team_name_in_use(&mut self, name: &str, exclude: Option<DbId>) -> StoreResult<bool> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM teams
                WHERE name = $1 AND deleted_at IS NULL
                  AND ($2::bigint IS NULL OR id <> $2)
             )",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(in_use)
    }

    async fn insert_team(&mut self, input: &CreateTeam, now: Timestamp) -> StoreResult<Team> {
        let query = format!(
            "INSERT INTO teams (name, description, created_at, updated_at)
             VALUES ($1, $2, $3, $3)
             RETURNING {TEAM_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Team>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn update_team(
        &mut self,
        id: DbId,
        name: &str,
        description: Option<&str>,
        now: Timestamp,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE teams SET name = $2, description = $3, updated_at = $4
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Serialization(format!(
                "team {id} vanished during update"
            )));
        }
        Ok(())
    }

    async fn tombstone_team(
        &mut self,
        id: DbId,
        renamed: &str,
        now: Timestamp,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE teams SET name = $2, deleted_at = $3, updated_at = $3
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(renamed)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Serialization(format!(
                "team {id} was already tombstoned"
            )));
        }
        Ok(())
    }

    async fn project_for_update(&mut self, id: DbId) -> StoreResult<Option<Project>> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_project(
        &mut self,
        input: &CreateProject,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<Project> {
        let query = format!(
            "INSERT INTO projects (name, abbreviation, team_id, status, start_date, end_date,
                                   created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {PROJECT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .bind(&input.abbreviation)
            .bind(input.team_id)
            .bind(status)
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn set_project_status(
        &mut self,
        id: DbId,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE projects SET status = $2, updated_at = $3
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Serialization(format!(
                "project {id} vanished during status update"
            )));
        }
        Ok(())
    }

    async fn tombstone_project(
        &mut self,
        id: DbId,
        renamed: &str,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE projects SET name = $2, status = $3, deleted_at = $4, updated_at = $4
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(renamed)
        .bind(status)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Serialization(format!(
                "project {id} was already tombstoned"
            )));
        }
        Ok(())
    }

    async fn count_open_projects_of_team(&mut self, team_id: DbId) -> StoreResult<i64> {
        // Terminal statuses mirror roster_core::project_status.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects
             WHERE team_id = $1 AND deleted_at IS NULL
               AND status NOT IN ('COMPLETED', 'CANCELLED')",
        )
        .bind(team_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn open_membership_of_user(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
    ) -> StoreResult<Option<MembershipInterval>> {
        let (table, col) = membership_table(kind);
        let query = format!(
            "SELECT {} FROM {table}
             WHERE user_id = $1 AND left_at IS NULL
             ORDER BY joined_at DESC LIMIT 1",
            membership_columns(col)
        );
        Ok(sqlx::query_as::<_, MembershipInterval>(&query)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn open_membership(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
        container_id: DbId,
    ) -> StoreResult<Option<MembershipInterval>> {
        let (table, col) = membership_table(kind);
        let query = format!(
            "SELECT {} FROM {table}
             WHERE user_id = $1 AND {col} = $2 AND left_at IS NULL",
            membership_columns(col)
        );
        Ok(sqlx::query_as::<_, MembershipInterval>(&query)
            .bind(user_id)
            .bind(container_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn open_memberships_of_container(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Vec<MembershipInterval>> {
        let (table, col) = membership_table(kind);
        let query = format!(
            "SELECT {} FROM {table}
             WHERE {col} = $1 AND left_at IS NULL
             ORDER BY joined_at, id",
            membership_columns(col)
        );
        Ok(sqlx::query_as::<_, MembershipInterval>(&query)
            .bind(container_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn membership_history_of_user(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
    ) -> StoreResult<Vec<MembershipInterval>> {
        let (table, col) = membership_table(kind);
        let query = format!(
            "SELECT {} FROM {table}
             WHERE user_id = $1
             ORDER BY joined_at DESC, id DESC",
            membership_columns(col)
        );
        Ok(sqlx::query_as::<_, MembershipInterval>(&query)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn insert_membership(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
        container_id: DbId,
        now: Timestamp,
    ) -> StoreResult<MembershipInterval> {
        let (table, col) = membership_table(kind);
        let query = format!(
            "INSERT INTO {table} (user_id, {col}, status, joined_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            membership_columns(col)
        );
        Ok(sqlx::query_as::<_, MembershipInterval>(&query)
            .bind(user_id)
            .bind(container_id)
            .bind(MembershipStatus::Active.as_str())
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn close_membership(
        &mut self,
        kind: ContainerKind,
        interval_id: DbId,
        now: Timestamp,
    ) -> StoreResult<()> {
        let (table, _col) = membership_table(kind);
        let query = format!(
            "UPDATE {table} SET status = $2, left_at = $3
             WHERE id = $1 AND left_at IS NULL"
        );
        let result = sqlx::query(&query)
            .bind(interval_id)
            .bind(MembershipStatus::Inactive.as_str())
            .bind(now)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Serialization(format!(
                "membership interval {interval_id} was already closed"
            )));
        }
        Ok(())
    }

    async fn open_leadership_of_container(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Option<LeadershipInterval>> {
        let (table, col) = leadership_table(kind);
        let query = format!(
            "SELECT {} FROM {table}
             WHERE {col} = $1 AND ended_at IS NULL",
            leadership_columns(col)
        );
        Ok(sqlx::query_as::<_, LeadershipInterval>(&query)
            .bind(container_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn leadership_history(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Vec<LeadershipInterval>> {
        let (table, col) = leadership_table(kind);
        let query = format!(
            "SELECT {} FROM {table}
             WHERE {col} = $1
             ORDER BY started_at DESC, id DESC",
            leadership_columns(col)
        );
        Ok(sqlx::query_as::<_, LeadershipInterval>(&query)
            .bind(container_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn insert_leadership(
        &mut self,
        kind: ContainerKind,
        leader_id: DbId,
        container_id: DbId,
        now: Timestamp,
    ) -> StoreResult<LeadershipInterval> {
        let (table, col) = leadership_table(kind);
        let query = format!(
            "INSERT INTO {table} (leader_id, {col}, started_at)
             VALUES ($1, $2, $3)
             RETURNING {}",
            leadership_columns(col)
        );
        Ok(sqlx::query_as::<_, LeadershipInterval>(&query)
            .bind(leader_id)
            .bind(container_id)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn close_leadership(
        &mut self,
        kind: ContainerKind,
        interval_id: DbId,
        now: Timestamp,
    ) -> StoreResult<()> {
        let (table, _col) = leadership_table(kind);
        let query = format!(
            "UPDATE {table} SET ended_at = $2
             WHERE id = $1 AND ended_at IS NULL"
        );
        let result = sqlx::query(&query)
            .bind(interval_id)
            .bind(now)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Serialization(format!(
                "leadership interval {interval_id} was already closed"
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
