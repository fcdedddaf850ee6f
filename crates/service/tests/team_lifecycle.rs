//! End-to-end team lifecycle scenarios over the in-memory store.

mod common;

use assert_matches::assert_matches;
use roster_core::error::CoreError;
use roster_core::membership::MembershipStatus;
use roster_core::policy::LeadershipOnTransfer;
use roster_db::models::team::{CreateTeam, UpdateTeam};
use roster_service::{ServiceError, TeamCoordinator};

use common::{harness, seed_team, seed_team_with_members, seed_user, ADMIN};

#[tokio::test]
async fn create_team_rejects_duplicate_live_name() {
    let h = harness();
    seed_team(&h.teams, "Platform").await;

    let err = h
        .teams
        .create_team(
            CreateTeam {
                name: "Platform".to_string(),
                description: None,
            },
            ADMIN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn blank_team_names_are_rejected() {
    let h = harness();
    let err = h
        .teams
        .create_team(
            CreateTeam {
                name: "   ".to_string(),
                description: None,
            },
            ADMIN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Validation(_)));

    let team = seed_team(&h.teams, "Alpha").await;
    let err = h
        .teams
        .update_team(
            team,
            UpdateTeam {
                name: Some(String::new()),
                ..Default::default()
            },
            ADMIN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Validation(_)));
    assert_eq!(h.teams.find_team(team).await.unwrap().name, "Alpha");
}

#[tokio::test]
async fn update_team_checks_name_against_other_live_teams_only() {
    let h = harness();
    let a = seed_team(&h.teams, "Alpha").await;
    seed_team(&h.teams, "Beta").await;

    let err = h
        .teams
        .update_team(
            a,
            UpdateTeam {
                name: Some("Beta".to_string()),
                ..Default::default()
            },
            ADMIN,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));

    // Re-submitting its own name is not a collision.
    let updated = h
        .teams
        .update_team(
            a,
            UpdateTeam {
                name: Some("Alpha".to_string()),
                description: Some("platform work".to_string()),
            },
            ADMIN,
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Alpha");
    assert_eq!(updated.description.as_deref(), Some("platform work"));
}

#[tokio::test]
async fn member_joins_one_team_at_a_time() {
    let h = harness();
    let (alpha, _) = seed_team_with_members(&h, "Alpha", 0).await;
    let beta = seed_team(&h.teams, "Beta").await;
    let user = seed_user(&h.store, "Dana").await;

    h.teams.add_member(alpha, user, ADMIN).await.unwrap();
    assert_eq!(h.teams.active_members(alpha).await.unwrap(), vec![user]);
    assert_eq!(h.teams.active_team_of(user).await.unwrap(), Some(alpha));

    // Same team again.
    let err = h.teams.add_member(alpha, user, ADMIN).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));

    // A different team while still active in the first.
    let err = h.teams.add_member(beta, user, ADMIN).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn remove_member_closes_the_interval_and_keeps_history() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let user = members[0];

    h.teams.remove_member(team, user, ADMIN).await.unwrap();
    assert!(h.teams.active_members(team).await.unwrap().is_empty());
    assert_eq!(h.teams.active_team_of(user).await.unwrap(), None);

    let history = h.teams.membership_history(user).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MembershipStatus::Inactive.as_str());
    assert!(history[0].left_at.is_some());

    // Nothing left to close.
    let err = h.teams.remove_member(team, user, ADMIN).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn rejoin_opens_a_fresh_interval() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let user = members[0];

    h.teams.remove_member(team, user, ADMIN).await.unwrap();
    h.teams.add_member(team, user, ADMIN).await.unwrap();

    let history = h.teams.membership_history(user).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].is_open());
    assert!(!history[1].is_open());
}

#[tokio::test]
async fn transfer_closes_source_and_opens_destination_atomically() {
    let h = harness();
    let (alpha, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let beta = seed_team(&h.teams, "Beta").await;
    let user = members[0];

    h.teams.transfer_member(user, beta, ADMIN).await.unwrap();

    assert_eq!(h.teams.active_team_of(user).await.unwrap(), Some(beta));
    assert!(h.teams.active_members(alpha).await.unwrap().is_empty());

    let history = h.teams.membership_history(user).await.unwrap();
    assert_eq!(history.len(), 2);
    let open: Vec<_> = history.iter().filter(|m| m.is_open()).collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].container_id, beta);
    // The close and the open carry the same instant.
    let closed = history.iter().find(|m| !m.is_open()).unwrap();
    assert_eq!(closed.left_at.unwrap(), open[0].joined_at);
}

#[tokio::test]
async fn transfer_round_trip_restores_the_original_team() {
    let h = harness();
    let (alpha, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let beta = seed_team(&h.teams, "Beta").await;
    let user = members[0];

    h.teams.transfer_member(user, beta, ADMIN).await.unwrap();
    h.teams.transfer_member(user, alpha, ADMIN).await.unwrap();

    assert_eq!(h.teams.active_team_of(user).await.unwrap(), Some(alpha));
    let history = h.teams.membership_history(user).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.iter().filter(|m| m.is_open()).count(), 1);
    assert_eq!(history.iter().filter(|m| !m.is_open()).count(), 2);
}

#[tokio::test]
async fn transfer_without_an_active_membership_is_a_conflict() {
    let h = harness();
    let beta = seed_team(&h.teams, "Beta").await;
    let user = seed_user(&h.store, "Dana").await;

    let err = h.teams.transfer_member(user, beta, ADMIN).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn leader_assignment_requires_active_membership() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let outsider = seed_user(&h.store, "Eve").await;

    let err = h
        .teams
        .assign_or_change_leader(team, outsider, ADMIN)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));

    h.teams
        .assign_or_change_leader(team, members[0], ADMIN)
        .await
        .unwrap();
    assert_eq!(h.teams.current_leader(team).await.unwrap(), Some(members[0]));
}

#[tokio::test]
async fn leader_change_closes_the_previous_interval() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 2).await;

    h.teams
        .assign_or_change_leader(team, members[0], ADMIN)
        .await
        .unwrap();
    h.teams
        .assign_or_change_leader(team, members[1], ADMIN)
        .await
        .unwrap();

    assert_eq!(h.teams.current_leader(team).await.unwrap(), Some(members[1]));
    let history = h.teams.leadership_history(team).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].is_open());
    assert_eq!(history[0].leader_id, members[1]);
    assert_eq!(history[1].ended_at.unwrap(), history[0].started_at);
}

#[tokio::test]
async fn reassigning_the_current_leader_adds_no_interval() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 1).await;

    h.teams
        .assign_or_change_leader(team, members[0], ADMIN)
        .await
        .unwrap();
    h.teams
        .assign_or_change_leader(team, members[0], ADMIN)
        .await
        .unwrap();

    assert_eq!(h.teams.leadership_history(team).await.unwrap().len(), 1);
}

#[tokio::test]
async fn the_current_leader_cannot_be_removed() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 1).await;
    h.teams
        .assign_or_change_leader(team, members[0], ADMIN)
        .await
        .unwrap();

    let err = h
        .teams
        .remove_member(team, members[0], ADMIN)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));
    // Still a member, still the leader.
    assert_eq!(h.teams.active_members(team).await.unwrap(), vec![members[0]]);
    assert_eq!(h.teams.current_leader(team).await.unwrap(), Some(members[0]));
}

#[tokio::test]
async fn leadership_handoff_unblocks_member_removal() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 2).await;
    let (a, b) = (members[0], members[1]);
    h.teams.assign_or_change_leader(team, a, ADMIN).await.unwrap();

    let err = h.teams.remove_member(team, a, ADMIN).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));

    h.teams.assign_or_change_leader(team, b, ADMIN).await.unwrap();
    let history = h.teams.leadership_history(team).await.unwrap();
    assert!(!history[1].is_open());
    assert_eq!(history[0].leader_id, b);

    h.teams.remove_member(team, a, ADMIN).await.unwrap();
    assert_eq!(h.teams.active_members(team).await.unwrap(), vec![b]);
}

#[tokio::test]
async fn transfer_releases_leadership_of_the_source_team_by_default() {
    let h = harness();
    let (alpha, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let beta = seed_team(&h.teams, "Beta").await;
    h.teams
        .assign_or_change_leader(alpha, members[0], ADMIN)
        .await
        .unwrap();

    h.teams.transfer_member(members[0], beta, ADMIN).await.unwrap();

    assert_eq!(h.teams.current_leader(alpha).await.unwrap(), None);
    let history = h.teams.leadership_history(alpha).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_open());
}

#[tokio::test]
async fn retain_policy_leaves_the_source_leadership_open() {
    let h = harness();
    let retaining =
        TeamCoordinator::with_transfer_policy(h.store.clone(), LeadershipOnTransfer::Retain);
    let (alpha, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let beta = seed_team(&h.teams, "Beta").await;
    h.teams
        .assign_or_change_leader(alpha, members[0], ADMIN)
        .await
        .unwrap();

    retaining
        .transfer_member(members[0], beta, ADMIN)
        .await
        .unwrap();

    assert_eq!(h.teams.active_team_of(members[0]).await.unwrap(), Some(beta));
    assert_eq!(h.teams.current_leader(alpha).await.unwrap(), Some(members[0]));
}

#[tokio::test]
async fn delete_team_closes_roster_and_frees_the_name() {
    let h = harness();
    let (team, members) = seed_team_with_members(&h, "Alpha", 2).await;
    h.teams
        .assign_or_change_leader(team, members[0], ADMIN)
        .await
        .unwrap();

    h.teams.delete_team(team, ADMIN).await.unwrap();

    let err = h.teams.find_team(team).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::NotFound { .. }));
    for &user in &members {
        assert_eq!(h.teams.active_team_of(user).await.unwrap(), None);
    }
    assert_eq!(h.teams.current_leader(team).await.unwrap(), None);

    // The tombstone rename frees the original name for reuse.
    seed_team(&h.teams, "Alpha").await;

    // Deleting again reports the aggregate as gone.
    let err = h.teams.delete_team(team, ADMIN).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn freed_members_can_join_another_team_after_delete() {
    let h = harness();
    let (alpha, members) = seed_team_with_members(&h, "Alpha", 1).await;
    let beta = seed_team(&h.teams, "Beta").await;

    h.teams.delete_team(alpha, ADMIN).await.unwrap();
    h.teams.add_member(beta, members[0], ADMIN).await.unwrap();
    assert_eq!(h.teams.active_team_of(members[0]).await.unwrap(), Some(beta));
}

#[tokio::test]
async fn bulk_add_collects_per_user_failures() {
    let h = harness();
    let (alpha, taken) = seed_team_with_members(&h, "Alpha", 1).await;
    let beta = seed_team(&h.teams, "Beta").await;
    let free_a = seed_user(&h.store, "Finn").await;
    let free_b = seed_user(&h.store, "Gus").await;
    let missing = 777_777;

    let outcome = h
        .teams
        .add_members_bulk(beta, &[free_a, taken[0], missing, free_b], ADMIN)
        .await
        .unwrap();

    assert_eq!(outcome.added, 2);
    assert_eq!(outcome.failures.len(), 2);
    assert_eq!(h.teams.active_members(beta).await.unwrap(), vec![free_a, free_b]);
    // Alpha's roster was untouched by the failed attempt.
    assert_eq!(h.teams.active_members(alpha).await.unwrap(), vec![taken[0]]);
}

#[tokio::test]
async fn bulk_add_fails_outright_when_nothing_succeeds() {
    let h = harness();
    let (_, taken) = seed_team_with_members(&h, "Alpha", 1).await;
    let beta = seed_team(&h.teams, "Beta").await;

    let err = h
        .teams
        .add_members_bulk(beta, &[taken[0]], ADMIN)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Conflict(_)));

    // An empty input is a successful no-op.
    let outcome = h.teams.add_members_bulk(beta, &[], ADMIN).await.unwrap();
    assert_eq!(outcome.added, 0);
    assert!(outcome.failures.is_empty());
}
