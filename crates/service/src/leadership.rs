//! The leadership ledger.
//!
//! Tracks who leads a container over time as non-overlapping intervals.
//! A leader change closes the open interval and opens the next one inside
//! the caller's transaction, so no reader ever observes a container with
//! zero or two open intervals across the change.

use chrono::Utc;
use roster_core::container::ContainerKind;
use roster_core::types::DbId;
use roster_db::models::leadership::LeadershipInterval;
use roster_db::store::StoreSession;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy)]
pub struct LeadershipLedger {
    kind: ContainerKind,
}

impl LeadershipLedger {
    pub fn new(kind: ContainerKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Open a leadership interval for a container that currently has none.
    ///
    /// Fails with `Conflict` when an open interval exists; callers wanting
    /// "set the leader regardless" should use [`Self::change`] and fall
    /// back to `assign`, which is what the coordinators'
    /// `assign_or_change_leader` does.
    pub async fn assign(
        &self,
        session: &mut dyn StoreSession,
        leader_id: DbId,
        container_id: DbId,
    ) -> ServiceResult<LeadershipInterval> {
        if session
            .open_leadership_of_container(self.kind, container_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict(format!(
                "{} {container_id} already has an active leader; change it instead",
                self.kind.entity().to_lowercase()
            )));
        }
        let interval = session
            .insert_leadership(self.kind, leader_id, container_id, Utc::now())
            .await?;
        Ok(interval)
    }

    /// Replace the current leader.
    ///
    /// No-op returning the existing interval when `new_leader` already
    /// leads the container. Fails with `Conflict` when there is no open
    /// interval to close.
    pub async fn change(
        &self,
        session: &mut dyn StoreSession,
        new_leader: DbId,
        container_id: DbId,
    ) -> ServiceResult<LeadershipInterval> {
        let open = session
            .open_leadership_of_container(self.kind, container_id)
            .await?
            .ok_or_else(|| {
                ServiceError::conflict(format!(
                    "no active leader for {} {container_id}; assign one first",
                    self.kind.entity().to_lowercase()
                ))
            })?;
        if open.leader_id == new_leader {
            return Ok(open);
        }
        let now = Utc::now();
        session.close_leadership(self.kind, open.id, now).await?;
        let interval = session
            .insert_leadership(self.kind, new_leader, container_id, now)
            .await?;
        Ok(interval)
    }

    /// Close the open interval if any; no-op when the container has no
    /// current leader.
    pub async fn remove(
        &self,
        session: &mut dyn StoreSession,
        container_id: DbId,
    ) -> ServiceResult<()> {
        if let Some(open) = session
            .open_leadership_of_container(self.kind, container_id)
            .await?
        {
            session
                .close_leadership(self.kind, open.id, Utc::now())
                .await?;
        }
        Ok(())
    }

    pub async fn current_leader_of(
        &self,
        session: &mut dyn StoreSession,
        container_id: DbId,
    ) -> ServiceResult<Option<DbId>> {
        Ok(session
            .open_leadership_of_container(self.kind, container_id)
            .await?
            .map(|l| l.leader_id))
    }

    /// Leadership history, most recent first.
    pub async fn history_of(
        &self,
        session: &mut dyn StoreSession,
        container_id: DbId,
    ) -> ServiceResult<Vec<LeadershipInterval>> {
        Ok(session.leadership_history(self.kind, container_id).await?)
    }
}
