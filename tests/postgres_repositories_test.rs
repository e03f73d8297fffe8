//! PostgreSQL repository integration tests
//!
//! These exercise the atomic SQL paths (conditional transitions, the partial
//! unique index, capacity under the group row lock). They only run when
//! TEST_DATABASE_URL points at a PostgreSQL instance; otherwise each test
//! skips.

use serial_test::serial;
use uuid::Uuid;

use mentorlink::database::connection::run_migrations;
use mentorlink::database::{
    ConnectionRepository, GroupRepository, JoinRequestOutcome, RosterChange, Storage,
};
use mentorlink::models::{
    ConnectionStatus, CreateConnectionRequest, CreateGroupRequest, GroupKind, MentorKind,
};

async fn pg_storage() -> Option<Storage> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL-backed test");
        return None;
    };

    let pool = sqlx::PgPool::connect(&url)
        .await
        .expect("connect to test database");
    run_migrations(&pool).await.expect("run migrations");
    Some(Storage::postgres(pool))
}

fn user(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

#[tokio::test]
#[serial]
async fn test_conditional_transition_races() {
    let Some(storage) = pg_storage().await else { return };

    let connection = storage
        .connections
        .create(CreateConnectionRequest {
            entrepreneur_id: user("e"),
            mentor_id: user("m"),
            mentor_kind: MentorKind::Personal,
            request_message: Some("Need help".to_string()),
        })
        .await
        .unwrap();

    // two conflicting decisions; exactly one may win
    let accept = storage
        .connections
        .transition(connection.id, ConnectionStatus::Pending, ConnectionStatus::Accepted)
        .await
        .unwrap();
    let reject = storage
        .connections
        .transition(connection.id, ConnectionStatus::Pending, ConnectionStatus::Rejected)
        .await
        .unwrap();

    assert!(accept.is_some());
    assert!(reject.is_none());

    let current = storage
        .connections
        .find_by_id(connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status, ConnectionStatus::Accepted);
}

#[tokio::test]
#[serial]
async fn test_partial_index_blocks_duplicate_pending() {
    let Some(storage) = pg_storage().await else { return };

    let group = storage
        .groups
        .create(
            &user("owner"),
            CreateGroupRequest {
                name: "Index test".to_string(),
                kind: GroupKind::SelfHelp,
                max_participants: 8,
                price_cents: None,
            },
        )
        .await
        .unwrap();
    let requester = user("u");

    let first = storage
        .groups
        .create_join_request(group.id, &requester, "Uma")
        .await
        .unwrap();
    assert!(matches!(first, JoinRequestOutcome::Created(_)));

    let second = storage
        .groups
        .create_join_request(group.id, &requester, "Uma")
        .await
        .unwrap();
    assert!(matches!(second, JoinRequestOutcome::DuplicatePending));

    // after rejection a new request goes through
    storage
        .groups
        .reject_request(group.id, &requester)
        .await
        .unwrap()
        .unwrap();
    let third = storage
        .groups
        .create_join_request(group.id, &requester, "Uma")
        .await
        .unwrap();
    assert!(matches!(third, JoinRequestOutcome::Created(_)));
}

#[tokio::test]
#[serial]
async fn test_row_lock_bounds_concurrent_joins() {
    let Some(storage) = pg_storage().await else { return };

    let group = storage
        .groups
        .create(
            &user("owner"),
            CreateGroupRequest {
                name: "Capacity test".to_string(),
                kind: GroupKind::Free,
                max_participants: 3,
                price_cents: None,
            },
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let groups = storage.groups.clone();
        let group_id = group.id;
        let joiner = user("joiner");
        handles.push(tokio::spawn(async move {
            groups.add_participant(group_id, &joiner).await
        }));
    }

    let mut added = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == RosterChange::Added {
            added += 1;
        }
    }

    // owner holds one slot, two joiners won the race
    assert_eq!(added, 2);
    assert_eq!(storage.groups.participant_count(group.id).await.unwrap(), 3);
}
