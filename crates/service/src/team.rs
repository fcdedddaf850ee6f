//! Team lifecycle coordination.
//!
//! Enforces the cross-ledger rules the ledgers alone cannot: a leader must
//! be an active member, a leader cannot be removed without a handoff, and
//! deleting a team closes its whole roster before the tombstone lands.
//! Every mutating operation runs inside one store session; an error on any
//! step rolls the whole operation back.

use chrono::Utc;
use roster_core::container::ContainerKind;
use roster_core::policy::LeadershipOnTransfer;
use roster_core::tombstone::tombstone_name;
use roster_core::types::DbId;
use roster_db::models::leadership::LeadershipInterval;
use roster_db::models::membership::MembershipInterval;
use roster_db::models::team::{CreateTeam, Team, UpdateTeam};
use roster_db::store::{Store, StoreSession};

use crate::error::{ServiceError, ServiceResult};
use crate::leadership::LeadershipLedger;
use crate::membership::MembershipLedger;

/// Outcome of a best-effort bulk add.
#[derive(Debug)]
pub struct BulkAddOutcome {
    pub added: usize,
    pub failures: Vec<BulkAddFailure>,
}

#[derive(Debug)]
pub struct BulkAddFailure {
    pub user_id: DbId,
    pub reason: String,
}

pub struct TeamCoordinator<S> {
    store: S,
    members: MembershipLedger,
    leaders: LeadershipLedger,
    on_transfer: LeadershipOnTransfer,
}

impl<S: Store> TeamCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self::with_transfer_policy(store, LeadershipOnTransfer::default())
    }

    pub fn with_transfer_policy(store: S, on_transfer: LeadershipOnTransfer) -> Self {
        Self {
            store,
            members: MembershipLedger::new(ContainerKind::Team),
            leaders: LeadershipLedger::new(ContainerKind::Team),
            on_transfer,
        }
    }

    /// Create a team. Fails with `Conflict` if a live team already uses
    /// the name.
    pub async fn create_team(&self, input: CreateTeam, actor: DbId) -> ServiceResult<Team> {
        require_team_name(&input.name)?;
        let mut session = self.store.begin().await?;
        if session.team_name_in_use(&input.name, None).await? {
            return Err(ServiceError::conflict(format!(
                "team name already exists: {}",
                input.name
            )));
        }
        let team = session.insert_team(&input, Utc::now()).await?;
        session.commit().await?;
        tracing::info!(team_id = team.id, actor, "Team created");
        Ok(team)
    }

    /// Update name and/or description. Unset fields keep their value.
    pub async fn update_team(
        &self,
        team_id: DbId,
        input: UpdateTeam,
        actor: DbId,
    ) -> ServiceResult<Team> {
        let mut session = self.store.begin().await?;
        let team = require_live_team(&mut *session, team_id).await?;

        let name = input.name.unwrap_or_else(|| team.name.clone());
        require_team_name(&name)?;
        if name != team.name && session.team_name_in_use(&name, Some(team_id)).await? {
            return Err(ServiceError::conflict(format!(
                "team name already exists: {name}"
            )));
        }
        let description = input.description.or_else(|| team.description.clone());

        session
            .update_team(team_id, &name, description.as_deref(), Utc::now())
            .await?;
        let updated = require_live_team(&mut *session, team_id).await?;
        session.commit().await?;
        tracing::info!(team_id, actor, "Team updated");
        Ok(updated)
    }

    /// Look up a live team; `NotFound` when missing or tombstoned.
    pub async fn find_team(&self, team_id: DbId) -> ServiceResult<Team> {
        let mut session = self.store.begin().await?;
        require_live_team(&mut *session, team_id).await
    }

    /// Add a user to the team.
    ///
    /// Fails when the team is tombstoned, the user has no live account, or
    /// the user is already active somewhere (`must leave their current
    /// team first`).
    pub async fn add_member(
        &self,
        team_id: DbId,
        user_id: DbId,
        actor: DbId,
    ) -> ServiceResult<MembershipInterval> {
        let mut session = self.store.begin().await?;
        require_live_team(&mut *session, team_id).await?;
        require_user(&mut *session, user_id).await?;
        let interval = self.members.join(&mut *session, user_id, team_id).await?;
        session.commit().await?;
        tracing::info!(team_id, user_id, actor, "Member added to team");
        Ok(interval)
    }

    /// Best-effort bulk add: attempts every user, collecting per-user
    /// failures instead of aborting. Each attempt is its own transaction,
    /// deliberately unlike the strictly atomic single operations.
    ///
    /// Fails as a whole only when the input was non-empty and nothing
    /// succeeded.
    pub async fn add_members_bulk(
        &self,
        team_id: DbId,
        user_ids: &[DbId],
        actor: DbId,
    ) -> ServiceResult<BulkAddOutcome> {
        let mut outcome = BulkAddOutcome {
            added: 0,
            failures: Vec::new(),
        };
        for &user_id in user_ids {
            match self.add_member(team_id, user_id, actor).await {
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
            team_id,
            actor,
            added = outcome.added,
            failed = outcome.failures.len(),
            "Bulk member add finished"
        );
        Ok(outcome)
    }

    /// Remove a member. Fails with `Conflict` while the user is the
    /// team's current leader.
    pub async fn remove_member(
        &self,
        team_id: DbId,
        user_id: DbId,
        actor: DbId,
    ) -> ServiceResult<()> {
        let mut session = self.store.begin().await?;
        require_live_team(&mut *session, team_id).await?;
        if self.leaders.current_leader_of(&mut *session, team_id).await? == Some(user_id) {
            return Err(ServiceError::conflict(format!(
                "user {user_id} currently leads this team; remove or reassign leadership first"
            )));
        }
        self.members.leave(&mut *session, user_id, team_id).await?;
        session.commit().await?;
        tracing::info!(team_id, user_id, actor, "Member removed from team");
        Ok(())
    }

    /// Move a user from their current team to `new_team_id`.
    ///
    /// What happens to a leadership the user holds on the source team is
    /// governed by the coordinator's [`LeadershipOnTransfer`] policy.
    pub async fn transfer_member(
        &self,
        user_id: DbId,
        new_team_id: DbId,
        actor: DbId,
    ) -> ServiceResult<MembershipInterval> {
        let mut session = self.store.begin().await?;
        require_live_team(&mut *session, new_team_id).await?;
        require_user(&mut *session, user_id).await?;
        let from = self
            .members
            .active_container_of(&mut *session, user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::conflict(format!(
                    "user {user_id} has no active team membership to transfer"
                ))
            })?;
        let interval = self
            .members
            .transfer(&mut *session, user_id, from, new_team_id)
            .await?;

        let led_source =
            self.leaders.current_leader_of(&mut *session, from).await? == Some(user_id);
        if led_source {
            match self.on_transfer {
                LeadershipOnTransfer::Release => {
                    self.leaders.remove(&mut *session, from).await?;
                    tracing::info!(
                        user_id,
                        from_team = from,
                        "Transfer released leadership of source team"
                    );
                }
                LeadershipOnTransfer::Retain => {
                    tracing::warn!(
                        user_id,
                        from_team = from,
                        "Transferred user still leads their former team"
                    );
                }
            }
        }
        session.commit().await?;
        tracing::info!(
            user_id,
            from_team = from,
            to_team = new_team_id,
            actor,
            "Member transferred"
        );
        Ok(interval)
    }

    /// Make `new_leader` the team's leader, whether or not the team
    /// currently has one. The leader must be an active member of the team.
    ///
    /// Changing to the current leader is a no-op returning the open
    /// interval.
    pub async fn assign_or_change_leader(
        &self,
        team_id: DbId,
        new_leader: DbId,
        actor: DbId,
    ) -> ServiceResult<LeadershipInterval> {
        let mut session = self.store.begin().await?;
        require_live_team(&mut *session, team_id).await?;
        require_user(&mut *session, new_leader).await?;
        if self
            .members
            .active_container_of(&mut *session, new_leader)
            .await?
            != Some(team_id)
        {
            return Err(ServiceError::conflict(
                "selected leader is not an active member of this team".to_string(),
            ));
        }
        let current = self.leaders.current_leader_of(&mut *session, team_id).await?;
        let interval = match current {
            None => self.leaders.assign(&mut *session, new_leader, team_id).await?,
            Some(_) => self.leaders.change(&mut *session, new_leader, team_id).await?,
        };
        session.commit().await?;
        tracing::info!(team_id, leader_id = new_leader, actor, "Team leader set");
        Ok(interval)
    }

    /// Tombstone a team: close the leadership interval, close every open
    /// membership, mark the row deleted and rename it. All-or-nothing.
    ///
    /// Fails with `Conflict` while the team still has non-terminal
    /// projects, and with `NotFound` on a repeat call.
    pub async fn delete_team(&self, team_id: DbId, actor: DbId) -> ServiceResult<()> {
        let mut session = self.store.begin().await?;
        let team = require_live_team(&mut *session, team_id).await?;

        let open_projects = session.count_open_projects_of_team(team_id).await?;
        if open_projects > 0 {
            return Err(ServiceError::conflict(format!(
                "team has {open_projects} active project(s); complete or cancel them first"
            )));
        }

        let now = Utc::now();
        self.leaders.remove(&mut *session, team_id).await?;
        for user_id in self.members.active_subjects_of(&mut *session, team_id).await? {
            self.members.leave(&mut *session, user_id, team_id).await?;
        }
        let renamed = tombstone_name(&team.name, team_id, now);
        session.tombstone_team(team_id, &renamed, now).await?;
        session.commit().await?;
        tracing::info!(team_id, actor, "Team deleted");
        Ok(())
    }

    // --- read operations ---

    /// User ids of the team's active members, in join order.
    pub async fn active_members(&self, team_id: DbId) -> ServiceResult<Vec<DbId>> {
        let mut session = self.store.begin().await?;
        self.members.active_subjects_of(&mut *session, team_id).await
    }

    /// The team a user is currently active in, if any.
    pub async fn active_team_of(&self, user_id: DbId) -> ServiceResult<Option<DbId>> {
        let mut session = self.store.begin().await?;
        self.members.active_container_of(&mut *session, user_id).await
    }

    /// A user's team membership intervals, open and closed, most recent
    /// first.
    pub async fn membership_history(&self, user_id: DbId) -> ServiceResult<Vec<MembershipInterval>> {
        let mut session = self.store.begin().await?;
        Ok(session
            .membership_history_of_user(ContainerKind::Team, user_id)
            .await?)
    }

    pub async fn current_leader(&self, team_id: DbId) -> ServiceResult<Option<DbId>> {
        let mut session = self.store.begin().await?;
        self.leaders.current_leader_of(&mut *session, team_id).await
    }

    /// Leadership history, most recent first.
    pub async fn leadership_history(
        &self,
        team_id: DbId,
    ) -> ServiceResult<Vec<LeadershipInterval>> {
        let mut session = self.store.begin().await?;
        self.leaders.history_of(&mut *session, team_id).await
    }
}

fn require_team_name(name: &str) -> ServiceResult<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::Core(
            roster_core::error::CoreError::Validation(
                "team name must not be empty".to_string(),
            ),
        ));
    }
    Ok(())
}

/// Fetch a team or fail with `NotFound`; tombstoned teams count as missing.
async fn require_live_team(
    session: &mut dyn StoreSession,
    team_id: DbId,
) -> ServiceResult<Team> {
    let team = session
        .team_for_update(team_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Team", team_id))?;
    if team.is_tombstoned() {
        return Err(ServiceError::not_found("Team", team_id));
    }
    Ok(team)
}

/// Fail with `NotFound` unless the user has a live account.
async fn require_user(session: &mut dyn StoreSession, user_id: DbId) -> ServiceResult<()> {
    session
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))?;
    Ok(())
}
