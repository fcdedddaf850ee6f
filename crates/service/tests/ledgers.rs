//! Ledger-level tests: interval semantics and the session's
//! rollback-on-drop contract, without a coordinator in the way.

mod common;

use assert_matches::assert_matches;
use roster_core::container::ContainerKind;
use roster_core::error::CoreError;
use roster_db::store::Store;
use roster_service::leadership::LeadershipLedger;
use roster_service::membership::MembershipLedger;
use roster_service::ServiceError;

use common::{harness, seed_team, seed_user};

#[tokio::test]
async fn dropping_a_session_rolls_back_its_writes() {
    let h = harness();
    let team = seed_team(&h.teams, "Alpha").await;
    let user = seed_user(&h.store, "Dana").await;
    let ledger = MembershipLedger::new(ContainerKind::Team);

    {
        let mut session = h.store.begin().await.unwrap();
        ledger.join(&mut *session, user, team).await.unwrap();
        // No commit; the session drops here.
    }

    let mut session = h.store.begin().await.unwrap();
    assert!(ledger
        .active_container_of(&mut *session, user)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn committed_writes_are_visible_to_later_sessions() {
    let h = harness();
    let team = seed_team(&h.teams, "Alpha").await;
    let user = seed_user(&h.store, "Dana").await;
    let ledger = MembershipLedger::new(ContainerKind::Team);

    let mut session = h.store.begin().await.unwrap();
    ledger.join(&mut *session, user, team).await.unwrap();
    session.commit().await.unwrap();

    let mut session = h.store.begin().await.unwrap();
    assert_eq!(
        ledger.active_container_of(&mut *session, user).await.unwrap(),
        Some(team)
    );
}

#[tokio::test]
async fn transfer_within_the_same_container_is_rejected() {
    let h = harness();
    let team = seed_team(&h.teams, "Alpha").await;
    let user = seed_user(&h.store, "Dana").await;
    let ledger = MembershipLedger::new(ContainerKind::Team);

    let mut session = h.store.begin().await.unwrap();
    ledger.join(&mut *session, user, team).await.unwrap();
    let err = ledger
        .transfer(&mut *session, user, team, team)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn assign_refuses_a_second_open_leadership() {
    let h = harness();
    let team = seed_team(&h.teams, "Alpha").await;
    let a = seed_user(&h.store, "Dana").await;
    let b = seed_user(&h.store, "Eve").await;
    let ledger = LeadershipLedger::new(ContainerKind::Team);

    let mut session = h.store.begin().await.unwrap();
    ledger.assign(&mut *session, a, team).await.unwrap();
    let err = ledger.assign(&mut *session, b, team).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn change_requires_an_open_leadership() {
    let h = harness();
    let team = seed_team(&h.teams, "Alpha").await;
    let user = seed_user(&h.store, "Dana").await;
    let ledger = LeadershipLedger::new(ContainerKind::Team);

    let mut session = h.store.begin().await.unwrap();
    let err = ledger.change(&mut *session, user, team).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn remove_without_a_leader_is_a_noop() {
    let h = harness();
    let team = seed_team(&h.teams, "Alpha").await;
    let ledger = LeadershipLedger::new(ContainerKind::Team);

    let mut session = h.store.begin().await.unwrap();
    ledger.remove(&mut *session, team).await.unwrap();
    assert!(ledger
        .current_leader_of(&mut *session, team)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn per_container_join_ignores_other_containers() {
    let h = harness();
    let user = seed_user(&h.store, "Dana").await;
    let ledger = MembershipLedger::new(ContainerKind::Project);

    // Project ids need no aggregate row at the ledger level.
    let mut session = h.store.begin().await.unwrap();
    ledger.join(&mut *session, user, 101).await.unwrap();
    ledger.join(&mut *session, user, 102).await.unwrap();
    let err = ledger.join(&mut *session, user, 101).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
}
