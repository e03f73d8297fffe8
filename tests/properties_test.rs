//! Property-based tests for store invariants

use std::sync::Arc;

use proptest::prelude::*;

use mentorlink::config::Settings;
use mentorlink::database::{
    GroupRepository, JoinRequestOutcome, MemoryStore, MessageRepository, Storage,
};
use mentorlink::models::{
    ConversationId, CreateGroupRequest, GroupKind, JoinRequestStatus, MentorKind,
};
use mentorlink::services::{NotificationService, PaymentService};
use mentorlink::MentorLinkError;
use uuid::Uuid;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn group_request(max_participants: i32) -> CreateGroupRequest {
    CreateGroupRequest {
        name: "Property group".to_string(),
        kind: GroupKind::Free,
        max_participants,
        price_cents: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Randomized concurrent joins never push a roster past its capacity.
    #[test]
    fn prop_concurrent_joins_never_overshoot(max in 2i32..10, joiners in 0usize..24) {
        let rt = runtime();
        let count = rt.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            let group = GroupRepository::create(&*store, "owner", group_request(max))
                .await
                .unwrap();

            let mut handles = Vec::new();
            for i in 0..joiners {
                let store = store.clone();
                let group_id = group.id;
                handles.push(tokio::spawn(async move {
                    store.add_participant(group_id, &format!("user-{i}")).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            store.participant_count(group.id).await.unwrap()
        });
        prop_assert!(count <= max as i64, "roster {count} exceeded capacity {max}");
    }

    /// No interleaving of requests and decisions yields two pending requests
    /// for the same (group, user) pair.
    #[test]
    fn prop_at_most_one_pending_request(attempts in 1usize..6, rounds in 1usize..4) {
        let rt = runtime();
        rt.block_on(async move {
            let store = MemoryStore::new();
            let group = GroupRepository::create(&store, "owner", group_request(16))
                .await
                .unwrap();

            for _ in 0..rounds {
                let mut created = 0;
                for _ in 0..attempts {
                    match store.create_join_request(group.id, "u1", "Uma").await.unwrap() {
                        JoinRequestOutcome::Created(_) => created += 1,
                        JoinRequestOutcome::DuplicatePending => {}
                    }
                }
                assert_eq!(created, 1);

                let pending = store.pending_requests(group.id).await.unwrap();
                assert_eq!(
                    pending
                        .iter()
                        .filter(|r| r.user_id == "u1" && r.status == JoinRequestStatus::Pending)
                        .count(),
                    1
                );

                // rejecting frees the slot for the next round
                store.reject_request(group.id, "u1").await.unwrap();
                assert!(store.pending_requests(group.id).await.unwrap().is_empty());
            }
        });
    }

    /// Re-listing from the same cursor yields the same messages, and the
    /// split at any cursor concatenates back to the full log.
    #[test]
    fn prop_list_since_is_idempotent(total in 1usize..20, cut in 0usize..20) {
        let rt = runtime();
        rt.block_on(async move {
            let store = MemoryStore::new();
            let conversation = ConversationId::group(Uuid::new_v4());

            for i in 0..total {
                store
                    .append(conversation, "u1", "Uma", &format!("msg {i}"))
                    .await
                    .unwrap();
            }

            let full = store.list_since(conversation, None, 100).await.unwrap();
            assert_eq!(full.len(), total);

            let idx = cut.min(total - 1);
            let cursor = full[idx].seq;

            let once = store.list_since(conversation, Some(cursor), 100).await.unwrap();
            let twice = store.list_since(conversation, Some(cursor), 100).await.unwrap();
            let once_ids: Vec<_> = once.iter().map(|m| m.id).collect();
            let twice_ids: Vec<_> = twice.iter().map(|m| m.id).collect();
            assert_eq!(once_ids, twice_ids);

            // prefix up to the cursor plus the tail equals the full log
            let mut recombined: Vec<_> = full.iter().take(idx + 1).map(|m| m.id).collect();
            recombined.extend(once_ids);
            let full_ids: Vec<_> = full.iter().map(|m| m.id).collect();
            assert_eq!(recombined, full_ids);
        });
    }

    /// Any interleaving of lifecycle operations keeps the payment invariant:
    /// an active personal connection always has a completed payment.
    #[test]
    fn prop_lifecycle_preserves_payment_invariant(ops in proptest::collection::vec(0u8..4, 0..12)) {
        let rt = runtime();
        rt.block_on(async move {
            let storage = Storage::in_memory();
            let notifications = NotificationService::new(storage.notifications.clone());
            let payments = PaymentService::new(Settings::default()).unwrap();
            let service = mentorlink::services::ConnectionService::new(
                storage.connections.clone(),
                notifications,
                payments,
            );

            let connection = service
                .request_connection("e1", "m1", MentorKind::Personal, Some("hi".to_string()))
                .await
                .unwrap();

            for op in ops {
                let result = match op {
                    0 => service.accept(connection.id, "m1").await,
                    1 => service.reject(connection.id, "m1").await,
                    2 => service.complete_payment(connection.id, "PAY123").await,
                    _ => service.record_session(connection.id).await,
                };
                match result {
                    Ok(_) => {}
                    Err(MentorLinkError::InvalidTransition { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }

                let current = service.get(connection.id).await.unwrap().unwrap();
                assert!(
                    current.payment_invariant_holds(),
                    "invariant broken after op {op}: {current:?}"
                );
            }
        });
    }
}
