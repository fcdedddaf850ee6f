#![allow(dead_code)]

//! Shared harness: coordinators wired to one in-memory store, plus row
//! seeding helpers. Cloning a `MemoryStore` shares state, so the team and
//! project coordinators here observe each other's commits exactly like
//! two services on one database would.

use std::sync::Once;

use chrono::Utc;
use roster_core::types::DbId;
use roster_db::memory::MemoryStore;
use roster_db::models::team::CreateTeam;
use roster_db::models::user::CreateUser;
use roster_db::store::Store;
use roster_service::{ProjectCoordinator, TeamCoordinator};

/// Actor id stamped on mutations in tests.
pub const ADMIN: DbId = 1_000_000;

pub struct Harness {
    pub store: MemoryStore,
    pub teams: TeamCoordinator<MemoryStore>,
    pub projects: ProjectCoordinator<MemoryStore>,
}

pub fn harness() -> Harness {
    init_tracing();
    let store = MemoryStore::default();
    Harness {
        teams: TeamCoordinator::new(store.clone()),
        projects: ProjectCoordinator::new(store.clone()),
        store,
    }
}

pub async fn seed_user(store: &MemoryStore, name: &str) -> DbId {
    let mut session = store.begin().await.unwrap();
    let user = session
        .insert_user(
            &CreateUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
            },
            Utc::now(),
        )
        .await
        .unwrap();
    session.commit().await.unwrap();
    user.id
}

pub async fn seed_team(teams: &TeamCoordinator<MemoryStore>, name: &str) -> DbId {
    teams
        .create_team(
            CreateTeam {
                name: name.to_string(),
                description: None,
            },
            ADMIN,
        )
        .await
        .unwrap()
        .id
}

/// Seed a team with `n` fresh members; returns (team id, member ids).
pub async fn seed_team_with_members(h: &Harness, name: &str, n: usize) -> (DbId, Vec<DbId>) {
    let team_id = seed_team(&h.teams, name).await;
    let mut members = Vec::with_capacity(n);
    for i in 0..n {
        let user_id = seed_user(&h.store, &format!("{name}-member-{i}")).await;
        h.teams.add_member(team_id, user_id, ADMIN).await.unwrap();
        members.push(user_id);
    }
    (team_id, members)
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
