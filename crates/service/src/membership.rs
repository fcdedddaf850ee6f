//! The membership ledger.
//!
//! Creates and closes membership intervals inside the caller's store
//! session, enforcing the kind's exclusivity rule: at most one open
//! interval per user across all teams, at most one per (user, project)
//! pair. Intervals are never deleted or re-opened; a rejoin opens a new
//! interval.
//!
//! The ledger knows nothing about leadership. Callers that must not close
//! a leader's membership (member removal) check that before calling
//! [`MembershipLedger::leave`].

use chrono::Utc;
use roster_core::container::{ContainerKind, Exclusivity};
use roster_core::types::DbId;
use roster_db::models::membership::MembershipInterval;
use roster_db::store::StoreSession;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy)]
pub struct MembershipLedger {
    kind: ContainerKind,
}

impl MembershipLedger {
    pub fn new(kind: ContainerKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Open a new ACTIVE interval for `user_id` in `container_id`.
    ///
    /// Fails with `Conflict` if the user already has an open interval in
    /// this container, or — for globally exclusive kinds — in any other
    /// container of the kind.
    pub async fn join(
        &self,
        session: &mut dyn StoreSession,
        user_id: DbId,
        container_id: DbId,
    ) -> ServiceResult<MembershipInterval> {
        let entity = self.kind.entity();
        match self.kind.exclusivity() {
            Exclusivity::Global => {
                if let Some(open) = session.open_membership_of_user(self.kind, user_id).await? {
                    if open.container_id == container_id {
                        return Err(ServiceError::conflict(format!(
                            "user {user_id} is already an active member of {} {container_id}",
                            entity.to_lowercase()
                        )));
                    }
                    return Err(ServiceError::conflict(format!(
                        "user {user_id} must leave their current {} first",
                        entity.to_lowercase()
                    )));
                }
            }
            Exclusivity::PerContainer => {
                if session
                    .open_membership(self.kind, user_id, container_id)
                    .await?
                    .is_some()
                {
                    return Err(ServiceError::conflict(format!(
                        "user {user_id} is already an active member of {} {container_id}",
                        entity.to_lowercase()
                    )));
                }
            }
        }
        let interval = session
            .insert_membership(self.kind, user_id, container_id, Utc::now())
            .await?;
        Ok(interval)
    }

    /// Close the user's open interval in `container_id`.
    ///
    /// Fails with `NotFound` if no open interval exists for the pair.
    pub async fn leave(
        &self,
        session: &mut dyn StoreSession,
        user_id: DbId,
        container_id: DbId,
    ) -> ServiceResult<()> {
        let open = session
            .open_membership(self.kind, user_id, container_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Active membership", user_id))?;
        session
            .close_membership(self.kind, open.id, Utc::now())
            .await?;
        Ok(())
    }

    /// Atomically close the open interval in `from` and open a new one in
    /// `to`. Both mutations happen in the caller's transaction; no state
    /// where the user has zero or two open intervals is ever committed.
    pub async fn transfer(
        &self,
        session: &mut dyn StoreSession,
        user_id: DbId,
        from: DbId,
        to: DbId,
    ) -> ServiceResult<MembershipInterval> {
        let entity = self.kind.entity().to_lowercase();
        if from == to {
            return Err(ServiceError::conflict(format!(
                "cannot transfer user {user_id} within the same {entity}"
            )));
        }
        let open = session
            .open_membership(self.kind, user_id, from)
            .await?
            .ok_or_else(|| {
                ServiceError::conflict(format!(
                    "user {user_id} has no active membership in {entity} {from}"
                ))
            })?;
        if session
            .open_membership(self.kind, user_id, to)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict(format!(
                "user {user_id} is already an active member of {entity} {to}"
            )));
        }
        let now = Utc::now();
        session.close_membership(self.kind, open.id, now).await?;
        let interval = session
            .insert_membership(self.kind, user_id, to, now)
            .await?;
        Ok(interval)
    }

    /// The container the user is currently active in, if any. For
    /// per-container kinds this returns an arbitrary one of the user's
    /// open containers; prefer [`Self::is_active_member`] there.
    pub async fn active_container_of(
        &self,
        session: &mut dyn StoreSession,
        user_id: DbId,
    ) -> ServiceResult<Option<DbId>> {
        Ok(session
            .open_membership_of_user(self.kind, user_id)
            .await?
            .map(|m| m.container_id))
    }

    /// Whether the user has an open interval in this specific container.
    pub async fn is_active_member(
        &self,
        session: &mut dyn StoreSession,
        user_id: DbId,
        container_id: DbId,
    ) -> ServiceResult<bool> {
        Ok(session
            .open_membership(self.kind, user_id, container_id)
            .await?
            .is_some())
    }

    /// User ids of all active members of a container.
    pub async fn active_subjects_of(
        &self,
        session: &mut dyn StoreSession,
        container_id: DbId,
    ) -> ServiceResult<Vec<DbId>> {
        Ok(session
            .open_memberships_of_container(self.kind, container_id)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect())
    }
}
