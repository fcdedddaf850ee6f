//! Project lifecycle coordination.
//!
//! Projects differ from teams in two ways that shape this coordinator:
//! membership is exclusive per project only (a user can be on many
//! projects at once), and a project carries a status machine whose
//! terminal states end the roster's life. Cancellation is the project's
//! tombstone: terminal status, `deleted_at`, a renamed row, and every
//! open interval closed in one transaction.

use chrono::Utc;
use roster_core::container::ContainerKind;
use roster_core::policy::LeadershipOnTransfer;
use roster_core::project_status::{validate_transition, ProjectStatus};
use roster_core::tombstone::tombstone_name;
use roster_core::types::DbId;
use roster_db::models::leadership::LeadershipInterval;
use roster_db::models::membership::MembershipInterval;
use roster_db::models::project::{CreateProject, Project};
use roster_db::store::{Store, StoreSession};

use crate::error::{ServiceError, ServiceResult};
use crate::leadership::LeadershipLedger;
use crate::membership::MembershipLedger;
use crate::team::{BulkAddFailure, BulkAddOutcome};

pub struct ProjectCoordinator<S> {
    store: S,
    members: MembershipLedger,
    leaders: LeadershipLedger,
    team_members: MembershipLedger,
    on_transfer: LeadershipOnTransfer,
}

impl<S: Store> ProjectCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self::with_transfer_policy(store, LeadershipOnTransfer::default())
    }

    pub fn with_transfer_policy(store: S, on_transfer: LeadershipOnTransfer) -> Self {
        Self {
            store,
            members: MembershipLedger::new(ContainerKind::Project),
            leaders: LeadershipLedger::new(ContainerKind::Project),
            team_members: MembershipLedger::new(ContainerKind::Team),
            on_transfer,
        }
    }

    /// Create a project in PLANNING, optionally owned by a team and
    /// seeded with an initial leader and members.
    ///
    /// Leader and members require an owning team and must be active
    /// members of it. The leader is enrolled once even when also listed
    /// in `member_ids`. All inserts commit together or not at all.
    pub async fn create_project(
        &self,
        input: CreateProject,
        actor: DbId,
    ) -> ServiceResult<Project> {
        let mut session = self.store.begin().await?;

        if input.name.trim().is_empty() {
            return Err(ServiceError::Core(roster_core::error::CoreError::Validation(
                "project name must not be empty".to_string(),
            )));
        }
        if let Some(team_id) = input.team_id {
            let team = session
                .team_for_update(team_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Team", team_id))?;
            if team.is_tombstoned() {
                return Err(ServiceError::not_found("Team", team_id));
            }
        } else if input.leader_id.is_some() || !input.member_ids.is_empty() {
            return Err(ServiceError::conflict(
                "an initial roster requires an owning team".to_string(),
            ));
        }

        let project = session
            .insert_project(&input, ProjectStatus::Planning.as_str(), Utc::now())
            .await?;

        if let Some(team_id) = input.team_id {
            let mut roster = input.member_ids.clone();
            if let Some(leader_id) = input.leader_id {
                if !roster.contains(&leader_id) {
                    roster.push(leader_id);
                }
            }
            for user_id in &roster {
                require_user(&mut *session, *user_id).await?;
                if !self
                    .team_members
                    .is_active_member(&mut *session, *user_id, team_id)
                    .await?
                {
                    return Err(ServiceError::conflict(format!(
                        "user {user_id} is not an active member of the chosen team"
                    )));
                }
                self.members.join(&mut *session, *user_id, project.id).await?;
            }
            if let Some(leader_id) = input.leader_id {
                self.leaders.assign(&mut *session, leader_id, project.id).await?;
            }
        }

        session.commit().await?;
        tracing::info!(
            project_id = project.id,
            team_id = input.team_id,
            actor,
            "Project created"
        );
        Ok(project)
    }

    /// Look up a live project; `NotFound` when missing or tombstoned.
    pub async fn find_project(&self, project_id: DbId) -> ServiceResult<Project> {
        let mut session = self.store.begin().await?;
        let (project, _) = require_live_project(&mut *session, project_id).await?;
        Ok(project)
    }

    /// Add a user to a live, non-terminal project. When the project has
    /// an owning team the user must be an active member of that team.
    pub async fn add_member(
        &self,
        project_id: DbId,
        user_id: DbId,
        actor: DbId,
    ) -> ServiceResult<MembershipInterval> {
        let mut session = self.store.begin().await?;
        let (project, status) = require_live_project(&mut *session, project_id).await?;
        require_open_status(project_id, status)?;
        require_user(&mut *session, user_id).await?;
        if let Some(team_id) = project.team_id {
            if !self
                .team_members
                .is_active_member(&mut *session, user_id, team_id)
                .await?
            {
                return Err(ServiceError::conflict(format!(
                    "user {user_id} is not an active member of the owning team"
                )));
            }
        }
        let interval = self.members.join(&mut *session, user_id, project_id).await?;
        session.commit().await?;
        tracing::info!(project_id, user_id, actor, "Member added to project");
        Ok(interval)
    }

    /// Best-effort bulk add, one transaction per user. See
    /// [`crate::team::TeamCoordinator::add_members_bulk`] for the
    /// all-failed rule.
    pub async fn add_members_bulk(
        &self,
        project_id: DbId,
        user_ids: &[DbId],
        actor: DbId,
    ) -> ServiceResult<BulkAddOutcome> {
        let mut outcome = BulkAddOutcome {
            added: 0,
            failures: Vec::new(),
        };
        for &user_id in user_ids {
            match self.add_member(project_id, user_id, actor).await {
                Ok(_) => outcome.added += 1,
                Err(e) => outcome.failures.push(BulkAddFailure {
                    user_id,
                    reason: e.to_string(),
                }),
            }
        }
        if outcome.added == 0 && !user_ids.is_empty() {
            let reasons: Vec<String> = outcome
                .failures
                .iter()
                .map(|f| format!("user {}: {}", f.user_id, f.reason))
                .collect();
            return Err(ServiceError::conflict(format!(
                "no members could be added: {}",
                reasons.join("; ")
            )));
        }
        tracing::info!(
            project_id,
            actor,
            added = outcome.added,
            failed = outcome.failures.len(),
            "Bulk member add finished"
        );
        Ok(outcome)
    }

    /// Remove a member. Fails with `Conflict` while the user is the
    /// project's current leader.
    pub async fn remove_member(
        &self,
        project_id: DbId,
        user_id: DbId,
        actor: DbId,
    ) -> ServiceResult<()> {
        let mut session = self.store.begin().await?;
        let (_, status) = require_live_project(&mut *session, project_id).await?;
        require_open_status(project_id, status)?;
        if self
            .leaders
            .current_leader_of(&mut *session, project_id)
            .await?
            == Some(user_id)
        {
            return Err(ServiceError::conflict(format!(
                "user {user_id} currently leads this project; remove or reassign leadership first"
            )));
        }
        self.members.leave(&mut *session, user_id, project_id).await?;
        session.commit().await?;
        tracing::info!(project_id, user_id, actor, "Member removed from project");
        Ok(())
    }

    /// Move a user's open interval from one project to another. Both
    /// projects must be live and non-terminal; the destination's owning
    /// team rule is the same as [`Self::add_member`]'s.
    pub async fn transfer_member(
        &self,
        user_id: DbId,
        from_project: DbId,
        to_project: DbId,
        actor: DbId,
    ) -> ServiceResult<MembershipInterval> {
        let mut session = self.store.begin().await?;
        // Lock the two rows in id order so opposite-direction transfers
        // cannot deadlock on each other's locks.
        let (lo, hi) = if from_project <= to_project {
            (from_project, to_project)
        } else {
            (to_project, from_project)
        };
        let lo_loaded = require_live_project(&mut *session, lo).await?;
        let hi_loaded = if hi == lo {
            lo_loaded.clone()
        } else {
            require_live_project(&mut *session, hi).await?
        };
        let ((_, from_status), (to, to_status)) = if lo == from_project {
            (lo_loaded, hi_loaded)
        } else {
            (hi_loaded, lo_loaded)
        };
        require_open_status(from_project, from_status)?;
        require_open_status(to_project, to_status)?;
        require_user(&mut *session, user_id).await?;
        if let Some(team_id) = to.team_id {
            if !self
                .team_members
                .is_active_member(&mut *session, user_id, team_id)
                .await?
            {
                return Err(ServiceError::conflict(format!(
                    "user {user_id} is not an active member of the owning team"
                )));
            }
        }
        let interval = self
            .members
            .transfer(&mut *session, user_id, from_project, to_project)
            .await?;

        let led_source = self
            .leaders
            .current_leader_of(&mut *session, from_project)
            .await?
            == Some(user_id);
        if led_source {
            match self.on_transfer {
                LeadershipOnTransfer::Release => {
                    self.leaders.remove(&mut *session, from_project).await?;
                    tracing::info!(
                        user_id,
                        from_project,
                        "Transfer released leadership of source project"
                    );
                }
                LeadershipOnTransfer::Retain => {
                    tracing::warn!(
                        user_id,
                        from_project,
                        "Transferred user still leads their former project"
                    );
                }
            }
        }
        session.commit().await?;
        tracing::info!(user_id, from_project, to_project, actor, "Member transferred");
        Ok(interval)
    }

    /// Make `new_leader` the project's leader. The leader must be an
    /// active member of the project itself.
    pub async fn assign_or_change_leader(
        &self,
        project_id: DbId,
        new_leader: DbId,
        actor: DbId,
    ) -> ServiceResult<LeadershipInterval> {
        let mut session = self.store.begin().await?;
        let (_, status) = require_live_project(&mut *session, project_id).await?;
        require_open_status(project_id, status)?;
        require_user(&mut *session, new_leader).await?;
        if !self
            .members
            .is_active_member(&mut *session, new_leader, project_id)
            .await?
        {
            return Err(ServiceError::conflict(
                "selected leader is not an active member of this project".to_string(),
            ));
        }
        let current = self
            .leaders
            .current_leader_of(&mut *session, project_id)
            .await?;
        let interval = match current {
            None => self.leaders.assign(&mut *session, new_leader, project_id).await?,
            Some(_) => self.leaders.change(&mut *session, new_leader, project_id).await?,
        };
        session.commit().await?;
        tracing::info!(project_id, leader_id = new_leader, actor, "Project leader set");
        Ok(interval)
    }

    /// Move the project through its status machine. Rejects transitions
    /// out of a terminal status, self-transitions, and edges the machine
    /// does not have.
    ///
    /// CANCELLED is not reachable here: a plain status write would leave
    /// the roster's intervals open and the row untombstoned, a state
    /// nothing could repair. [`Self::cancel_project`] is the only path
    /// into CANCELLED.
    pub async fn update_status(
        &self,
        project_id: DbId,
        to: ProjectStatus,
        actor: DbId,
    ) -> ServiceResult<Project> {
        if to == ProjectStatus::Cancelled {
            return Err(ServiceError::conflict(
                "projects are cancelled through cancel_project, which also closes the roster"
                    .to_string(),
            ));
        }
        let mut session = self.store.begin().await?;
        let (_, from) = require_live_project(&mut *session, project_id).await?;
        validate_transition(from, to).map_err(ServiceError::Core)?;
        session
            .set_project_status(project_id, to.as_str(), Utc::now())
            .await?;
        let (updated, _) = require_live_project(&mut *session, project_id).await?;
        session.commit().await?;
        tracing::info!(
            project_id,
            from = from.as_str(),
            to = to.as_str(),
            actor,
            "Project status changed"
        );
        Ok(updated)
    }

    /// Cancel a project: CANCELLED status, `deleted_at` stamped, name
    /// rewritten, leadership and every open membership closed. One
    /// transaction; fails with `Conflict` when the project is already in
    /// a terminal status (including a repeat cancel).
    pub async fn cancel_project(&self, project_id: DbId, actor: DbId) -> ServiceResult<()> {
        let mut session = self.store.begin().await?;
        let project = session
            .project_for_update(project_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Project", project_id))?;
        let status = ProjectStatus::parse(&project.status).map_err(ServiceError::Core)?;
        if status.is_terminal() {
            return Err(ServiceError::conflict(format!(
                "project {project_id} is already {}",
                status.as_str()
            )));
        }

        let now = Utc::now();
        self.leaders.remove(&mut *session, project_id).await?;
        for user_id in self
            .members
            .active_subjects_of(&mut *session, project_id)
            .await?
        {
            self.members.leave(&mut *session, user_id, project_id).await?;
        }
        let renamed = tombstone_name(&project.name, project_id, now);
        session
            .tombstone_project(project_id, &renamed, ProjectStatus::Cancelled.as_str(), now)
            .await?;
        session.commit().await?;
        tracing::info!(project_id, actor, "Project cancelled");
        Ok(())
    }

    // --- read operations ---

    /// User ids of the project's active members, in join order.
    pub async fn active_members(&self, project_id: DbId) -> ServiceResult<Vec<DbId>> {
        let mut session = self.store.begin().await?;
        self.members
            .active_subjects_of(&mut *session, project_id)
            .await
    }

    pub async fn current_leader(&self, project_id: DbId) -> ServiceResult<Option<DbId>> {
        let mut session = self.store.begin().await?;
        self.leaders
            .current_leader_of(&mut *session, project_id)
            .await
    }

    /// Leadership history, most recent first.
    pub async fn leadership_history(
        &self,
        project_id: DbId,
    ) -> ServiceResult<Vec<LeadershipInterval>> {
        let mut session = self.store.begin().await?;
        self.leaders.history_of(&mut *session, project_id).await
    }

    /// A user's project membership intervals, open and closed, most
    /// recent first.
    pub async fn membership_history(&self, user_id: DbId) -> ServiceResult<Vec<MembershipInterval>> {
        let mut session = self.store.begin().await?;
        Ok(session
            .membership_history_of_user(ContainerKind::Project, user_id)
            .await?)
    }
}

/// Fetch a project or fail with `NotFound`; tombstoned rows count as
/// missing. Also parses the stored status.
async fn require_live_project(
    session: &mut dyn StoreSession,
    project_id: DbId,
) -> ServiceResult<(Project, ProjectStatus)> {
    let project = session
        .project_for_update(project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project", project_id))?;
    if project.is_tombstoned() {
        return Err(ServiceError::not_found("Project", project_id));
    }
    let status = ProjectStatus::parse(&project.status).map_err(ServiceError::Core)?;
    Ok((project, status))
}

/// Roster mutations are only legal while the project is in a
/// non-terminal status.
fn require_open_status(project_id: DbId, status: ProjectStatus) -> ServiceResult<()> {
    if status.is_terminal() {
        return Err(ServiceError::conflict(format!(
            "project {project_id} is {}; its roster is frozen",
            status.as_str()
        )));
    }
    Ok(())
}

/// Fail with `NotFound` unless the user has a live account.
async fn require_user(session: &mut dyn StoreSession, user_id: DbId) -> ServiceResult<()> {
    session
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))?;
    Ok(())
}
