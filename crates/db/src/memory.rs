//! In-memory implementation of the store contract.
//!
//! Mirrors the PostgreSQL semantics (soft-delete filters, open-interval
//! lookups, ordering) over plain maps so the service layer can be exercised
//! without a database. Sessions stage their writes on a cloned state and
//! publish it on commit; a dropped session discards the clone, which gives
//! the same rollback-on-drop contract as a real transaction.
//!
//! This store does not replicate row locking; it is intended for tests and
//! single-writer tooling, not production use.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roster_core::container::ContainerKind;
use roster_core::membership::MembershipStatus;
use roster_core::project_status::{PROJECT_CANCELLED, PROJECT_COMPLETED};
use roster_core::types::{DbId, Timestamp};

use crate::models::leadership::LeadershipInterval;
use crate::models::membership::MembershipInterval;
use crate::models::project::{CreateProject, Project};
use crate::models::team::{CreateTeam, Team};
use crate::models::user::{CreateUser, User};
use crate::store::{Store, StoreError, StoreResult, StoreSession};

#[derive(Debug, Default, Clone)]
struct State {
    next_id: DbId,
    users: BTreeMap<DbId, User>,
    teams: BTreeMap<DbId, Team>,
    projects: BTreeMap<DbId, Project>,
    team_members: BTreeMap<DbId, MembershipInterval>,
    project_members: BTreeMap<DbId, MembershipInterval>,
    team_leaders: BTreeMap<DbId, LeadershipInterval>,
    project_leaders: BTreeMap<DbId, LeadershipInterval>,
}

impl State {
    fn alloc_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn memberships(&self, kind: ContainerKind) -> &BTreeMap<DbId, MembershipInterval> {
        match kind {
            ContainerKind::Team => &self.team_members,
            ContainerKind::Project => &self.project_members,
        }
    }

    fn memberships_mut(&mut self, kind: ContainerKind) -> &mut BTreeMap<DbId, MembershipInterval> {
        match kind {
            ContainerKind::Team => &mut self.team_members,
            ContainerKind::Project => &mut self.project_members,
        }
    }

    fn leaderships(&self, kind: ContainerKind) -> &BTreeMap<DbId, LeadershipInterval> {
        match kind {
            ContainerKind::Team => &self.team_leaders,
            ContainerKind::Project => &self.project_leaders,
        }
    }

    fn leaderships_mut(&mut self, kind: ContainerKind) -> &mut BTreeMap<DbId, LeadershipInterval> {
        match kind {
            ContainerKind::Team => &mut self.team_leaders,
            ContainerKind::Project => &mut self.project_leaders,
        }
    }
}

/// Store backed by process memory. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreSession>> {
        // A poisoned lock only means another session panicked mid-stage;
        // the shared state itself is always consistent.
        let staged = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.state),
            staged,
        }))
    }
}

/// One staged unit of work over a cloned state snapshot.
pub struct MemorySession {
    shared: Arc<Mutex<State>>,
    staged: State,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn user_by_id(&mut self, id: DbId) -> StoreResult<Option<User>> {
        Ok(self
            .staged
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn insert_user(&mut self, input: &CreateUser, now: Timestamp) -> StoreResult<User> {
        let id = self.staged.alloc_id();
        let user = User {
            id,
            name: input.name.clone(),
            email: input.email.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.staged.users.insert(id, user.clone());
        Ok(user)
    }

    async fn team_for_update(&mut self, id: DbId) -> StoreResult<Option<Team>> {
        Ok(self.staged.teams.get(&id).cloned())
    }

    async fn team_name_in_use(&mut self, name: &str, exclude: Option<DbId>) -> StoreResult<bool> {
        Ok(self.staged.teams.values().any(|t| {
            t.name == name && t.deleted_at.is_none() && Some(t.id) != exclude
        }))
    }

    async fn insert_team(&mut self, input: &CreateTeam, now: Timestamp) -> StoreResult<Team> {
        let id = self.staged.alloc_id();
        let team = Team {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.staged.teams.insert(id, team.clone());
        Ok(team)
    }

    async fn update_team(
        &mut self,
        id: DbId,
        name: &str,
        description: Option<&str>,
        now: Timestamp,
    ) -> StoreResult<()> {
        match self.staged.teams.get_mut(&id) {
            Some(team) if team.deleted_at.is_none() => {
                team.name = name.to_string();
                team.description = description.map(str::to_string);
                team.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::Serialization(format!(
                "team {id} vanished during update"
            ))),
        }
    }

    async fn tombstone_team(
        &mut self,
        id: DbId,
        renamed: &str,
        now: Timestamp,
    ) -> StoreResult<()> {
        match self.staged.teams.get_mut(&id) {
            Some(team) if team.deleted_at.is_none() => {
                team.name = renamed.to_string();
                team.deleted_at = Some(now);
                team.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::Serialization(format!(
                "team {id} was already tombstoned"
            ))),
        }
    }

    async fn project_for_update(&mut self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(self.staged.projects.get(&id).cloned())
    }

    async fn insert_project(
        &mut self,
        input: &CreateProject,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<Project> {
        let id = self.staged.alloc_id();
        let project = Project {
            id,
            name: input.name.clone(),
            abbreviation: input.abbreviation.clone(),
            team_id: input.team_id,
            status: status.to_string(),
            start_date: input.start_date,
            end_date: input.end_date,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.staged.projects.insert(id, project.clone());
        Ok(project)
    }

    async fn set_project_status(
        &mut self,
        id: DbId,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<()> {
        match self.staged.projects.get_mut(&id) {
            Some(project) if project.deleted_at.is_none() => {
                project.status = status.to_string();
                project.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::Serialization(format!(
                "project {id} vanished during status update"
            ))),
        }
    }

    async fn tombstone_project(
        &mut self,
        id: DbId,
        renamed: &str,
        status: &str,
        now: Timestamp,
    ) -> StoreResult<()> {
        match self.staged.projects.get_mut(&id) {
            Some(project) if project.deleted_at.is_none() => {
                project.name = renamed.to_string();
                project.status = status.to_string();
                project.deleted_at = Some(now);
                project.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::Serialization(format!(
                "project {id} was already tombstoned"
            ))),
        }
    }

    async fn count_open_projects_of_team(&mut self, team_id: DbId) -> StoreResult<i64> {
        Ok(self
            .staged
            .projects
            .values()
            .filter(|p| {
                p.team_id == Some(team_id)
                    && p.deleted_at.is_none()
                    && p.status != PROJECT_COMPLETED
                    && p.status != PROJECT_CANCELLED
            })
            .count() as i64)
    }

    async fn open_membership_of_user(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
    ) -> StoreResult<Option<MembershipInterval>> {
        Ok(self
            .staged
            .memberships(kind)
            .values()
            .filter(|m| m.user_id == user_id && m.is_open())
            .max_by_key(|m| (m.joined_at, m.id))
            .cloned())
    }

    async fn open_membership(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
        container_id: DbId,
    ) -> StoreResult<Option<MembershipInterval>> {
        Ok(self
            .staged
            .memberships(kind)
            .values()
            .find(|m| m.user_id == user_id && m.container_id == container_id && m.is_open())
            .cloned())
    }

    async fn open_memberships_of_container(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Vec<MembershipInterval>> {
        let mut rows: Vec<_> = self
            .staged
            .memberships(kind)
            .values()
            .filter(|m| m.container_id == container_id && m.is_open())
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.joined_at, m.id));
        Ok(rows)
    }

    async fn membership_history_of_user(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
    ) -> StoreResult<Vec<MembershipInterval>> {
        let mut rows: Vec<_> = self
            .staged
            .memberships(kind)
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| std::cmp::Reverse((m.joined_at, m.id)));
        Ok(rows)
    }

    async fn insert_membership(
        &mut self,
        kind: ContainerKind,
        user_id: DbId,
        container_id: DbId,
        now: Timestamp,
    ) -> StoreResult<MembershipInterval> {
        let id = self.staged.alloc_id();
        let interval = MembershipInterval {
            id,
            user_id,
            container_id,
            status: MembershipStatus::Active.as_str().to_string(),
            joined_at: now,
            left_at: None,
        };
        self.staged.memberships_mut(kind).insert(id, interval.clone());
        Ok(interval)
    }

    async fn close_membership(
        &mut self,
        kind: ContainerKind,
        interval_id: DbId,
        now: Timestamp,
    ) -> StoreResult<()> {
        match self.staged.memberships_mut(kind).get_mut(&interval_id) {
            Some(interval) if interval.is_open() => {
                interval.status = MembershipStatus::Inactive.as_str().to_string();
                interval.left_at = Some(now);
                Ok(())
            }
            _ => Err(StoreError::Serialization(format!(
                "membership interval {interval_id} was already closed"
            ))),
        }
    }

    async fn open_leadership_of_container(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Option<LeadershipInterval>> {
        Ok(self
            .staged
            .leaderships(kind)
            .values()
            .find(|l| l.container_id == container_id && l.is_open())
            .cloned())
    }

    async fn leadership_history(
        &mut self,
        kind: ContainerKind,
        container_id: DbId,
    ) -> StoreResult<Vec<LeadershipInterval>> {
        let mut rows: Vec<_> = self
            .staged
            .leaderships(kind)
            .values()
            .filter(|l| l.container_id == container_id)
            .cloned()
            .collect();
        rows.sort_by_key(|l| std::cmp::Reverse((l.started_at, l.id)));
        Ok(rows)
    }

    async fn insert_leadership(
        &mut self,
        kind: ContainerKind,
        leader_id: DbId,
        container_id: DbId,
        now: Timestamp,
    ) -> StoreResult<LeadershipInterval> {
        let id = self.staged.alloc_id();
        let interval = LeadershipInterval {
            id,
            leader_id,
            container_id,
            started_at: now,
            ended_at: None,
        };
        self.staged.leaderships_mut(kind).insert(id, interval.clone());
        Ok(interval)
    }

    async fn close_leadership(
        &mut self,
        kind: ContainerKind,
        interval_id: DbId,
        now: Timestamp,
    ) -> StoreResult<()> {
        match self.staged.leaderships_mut(kind).get_mut(&interval_id) {
            Some(interval) if interval.is_open() => {
                interval.ended_at = Some(now);
                Ok(())
            }
            _ => Err(StoreError::Serialization(format!(
                "leadership interval {interval_id} was already closed"
            ))),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        *self
            .shared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = self.staged;
        Ok(())
    }
}
