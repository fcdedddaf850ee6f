//! The transactional store contract.
//!
//! A [`StoreSession`] is one atomic unit of work over an aggregate and its
//! interval rows: every coordinator mutation acquires a session, performs
//! its reads and writes through it, and either commits or drops it. Dropping
//! an uncommitted session rolls back everything, on every exit path.
//!
//! The row operations here are the narrow surface the ledgers and
//! coordinators need; invariant checks happen in code above this trait, and
//! database constraints are only a last-resort safety net behind them.

use async_trait::async_trait;
use roster_core::container::ContainerKind;
use roster_core::types::{DbId, Timestamp};

use crate::models::leadership::LeadershipInterval;
use crate::models::membership::MembershipInterval;
use crate::models::project::{CreateProject, Project};
use crate::models::team::{CreateTeam, Team};
use crate::models::user::{CreateUser, User};

/// Storage-layer errors. Transient by nature: the caller may retry the
/// whole coordinator operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row this transaction expected to mutate was already changed by a
    /// concurrent writer (detected via zero rows affected).
    #[error("concurrent modification: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Opens atomic units of work.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreSession>>;
}

/// One transaction's worth of row operations.
///
/// Aggregate lookups marked `for_update` lock the aggregate row so that
/// concurrent writers on the same aggregate serialize; writers on different
/// aggregates proceed in parallel. Open-interval lookups are O(log n),
/// backed by partial indexes on `left_at IS NULL` / `ended_at IS NULL`.
#[async_trait]
pub trait StoreSession: Send {
    // --- users ---

    /// Look up a live (non-deactivated) user account.
    async fn user_by_id(&mut self, id: DbId) -> StoreResult<Option<User>>;

    async fn insert_user(&mut self, input: &CreateUser, now: Timestamp) -> StoreResult<User>;

    // --- teams ---

    /// Fetch a team row, including tombstoned rows, holding a row lock for
    /// the rest of the transaction.
    async fn team_for_update(&mut self, id: DbId) -> StoreResult<Option<Team>>;

    /// Whether a live team other than `exclude` already uses `name`.
    async fn team_name_in_use(&mut self, name: &str, exclude: Option<DbId>) -> StoreResult<bool>;

    async fn insert_team(&mut self, input: &CreateTeam, now: Timestamp) -> StoreResult<Team>;

    async fn update_team(
        &mut self,
        id: DbId,
        name: &str,
        description: Option<&str>,
        now: Timestamp,
    ) -> StoreResult<()>;

    /// Mark a team deleted and rewrite its name to `renamed`.
    async fn tombstone_team(&mut self, id: DbId, renamed: &str, now: Timestamp)
        -> StoreResult<()>;

    // --- projects ---

    /// Fetch a project row, including tombstoned rows, holding a row lock.
    async fn project_for_update(&mut self, id: DbId) -> StoreResult<Option<Project>>;

    async fn insert_project(
        &mut self,
        input: &CreateProject,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<Project>;

    async fn set_project_status(
        &mut self,
        id: DbId,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<()>;

    /// Mark a project deleted, set its terminal status, and rewrite its name.
    async fn tombstone_project(
        &mut self,
        id: DbId,
        renamed: &str,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<()>;

    /// Number of live projects of a team whose status is not terminal.
    async fn count_open_projects_of_team(&mut self, team_id: DbId) -> StoreResult<i64>;

    // --- membership intervals ---

    /// The user's open interval in any container of the kind, if one exists.
    /// Meaningful for globally exclusive kinds; for per-container kinds it
    /// returns an arbitrary open interval.
    async fn open_membership_of_user(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
    ) -> StoreResult<Option<MembershipInterval>>;

    /// The user's open interval in one specific container.
    async fn open_membership(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
        container_id: DbId,
    ) -> StoreResult<Option<MembershipInterval>>;

    /// All open intervals of a container, ordered by `joined_at` ascending.
    async fn open_memberships_of_container(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Vec<MembershipInterval>>;

    /// A user's full interval history across the kind, most recent first.
    async fn membership_history_of_user(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
    ) -> StoreResult<Vec<MembershipInterval>>;

    /// Open a new ACTIVE interval.
    async fn insert_membership(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
        container_id: DbId,
        now: Timestamp,
    ) -> StoreResult<MembershipInterval>;

    /// Close an interval: status INACTIVE, `left_at` stamped. Fails with
    /// `Serialization` if the interval is already closed.
    async fn close_membership(
        &mut self,
        kind: ContainerKind,
        interval_id: DbId,
        now: Timestamp,
    ) -> StoreResult<()>;

    // --- leadership intervals ---

    /// The container's open leadership interval, if any.
    async fn open_leadership_of_container(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Option<LeadershipInterval>>;

    /// Full leadership history of a container, most recent first.
    async fn leadership_history(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Vec<LeadershipInterval>>;

    /// Open a new leadership interval.
    async fn insert_leadership(
        &mut self,
        kind: ContainerKind,
        leader_id: DbId,
        container_id: DbId,
        now: Timestamp,
    ) -> StoreResult<LeadershipInterval>;

    /// Close a leadership interval. Fails with `Serialization` if already
    /// closed.
    async fn close_leadership(
        &mut self,
        kind: ContainerKind,
        interval_id: DbId,
        now: Timestamp,
    ) -> StoreResult<()>;

    // --- transaction boundary ---

    /// Commit the unit of work. Dropping the session instead rolls back.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
