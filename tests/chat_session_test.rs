//! Chat session state machine integration tests

mod helpers;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::Notify;

use mentorlink::config::Settings;
use mentorlink::database::{MemoryStore, MessageRepository, Storage};
use mentorlink::models::{ConversationId, Message};
use mentorlink::services::ServiceFactory;
use mentorlink::session::{SessionEvent, SessionState};
use mentorlink::{MentorLinkError, Result};

use helpers::{free_group, self_help_group, TestContext};

#[tokio::test]
async fn test_open_loads_backlog_and_goes_ready() {
    let ctx = TestContext::new();
    let group = free_group(&ctx, "owner", 5).await;
    let conversation = ConversationId::group(group.id);

    ctx.services
        .message_log
        .append(conversation, "owner", "Olive", "first")
        .await
        .unwrap();

    let session = ctx.services.create_session("owner", "Olive");
    assert_eq!(session.state(), SessionState::Idle);

    session.open(conversation).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.conversation(), Some(conversation));

    let backlog = session.backlog();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].body, "first");

    // opening twice is an invalid transition
    assert_matches!(
        session.open(conversation).await,
        Err(MentorLinkError::InvalidTransition { .. })
    );
}

#[tokio::test]
async fn test_first_open_auto_enrolls_in_free_group() {
    let ctx = TestContext::new();
    let group = free_group(&ctx, "owner", 5).await;
    let conversation = ConversationId::group(group.id);

    let session = ctx.services.create_session("newcomer", "Nina");
    session.open(conversation).await.unwrap();

    assert!(ctx
        .services
        .membership_service
        .is_participant(group.id, "newcomer")
        .await
        .unwrap());
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_request_gated_group_refuses_first_open() {
    let ctx = TestContext::new();
    let group = self_help_group(&ctx, "owner", 5).await;
    let conversation = ConversationId::group(group.id);

    let session = ctx.services.create_session("outsider", "Oscar");
    let result = session.open(conversation).await;
    assert_matches!(result, Err(MentorLinkError::PermissionDenied(_)));

    // the failed open leaves the session reusable
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!ctx
        .services
        .membership_service
        .is_participant(group.id, "outsider")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_non_participant_append_leaves_log_untouched() {
    let ctx = TestContext::new();
    let group = self_help_group(&ctx, "owner", 5).await;
    let conversation = ConversationId::group(group.id);

    let result = ctx
        .services
        .message_log
        .append(conversation, "U1", "Uma", "hello")
        .await;
    assert_matches!(result, Err(MentorLinkError::PermissionDenied(_)));

    let backlog = ctx
        .services
        .message_log
        .list_since(conversation, None)
        .await
        .unwrap();
    assert!(backlog.is_empty());
}

#[tokio::test]
async fn test_two_sessions_exchange_messages_in_order() {
    let ctx = TestContext::new();
    let group = free_group(&ctx, "alice", 5).await;
    let conversation = ConversationId::group(group.id);

    let alice = ctx.services.create_session("alice", "Alice");
    let bob = ctx.services.create_session("bob", "Bob");
    alice.open(conversation).await.unwrap();
    bob.open(conversation).await.unwrap();

    let sent = alice.send("hello bob").await.unwrap().unwrap();
    assert_eq!(sent.body, "hello bob");
    assert_eq!(alice.state(), SessionState::Ready);

    match bob.recv_event().await.unwrap() {
        SessionEvent::Message(message) => {
            assert_eq!(message.body, "hello bob");
            assert_eq!(message.sender_name, "Alice");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    bob.send("hi alice").await.unwrap().unwrap();
    match alice.recv_event().await.unwrap() {
        SessionEvent::Message(message) => assert_eq!(message.body, "hi alice"),
        other => panic!("unexpected event: {other:?}"),
    }

    // both sides converge on the same ordered backlog
    let alice_log: Vec<_> = alice.backlog().iter().map(|m| m.seq).collect();
    let bob_log: Vec<_> = bob.backlog().iter().map(|m| m.seq).collect();
    assert_eq!(alice_log, bob_log);
    assert!(alice_log.windows(2).all(|w| w[0] < w[1]));

    alice.close().await.unwrap();
    bob.close().await.unwrap();
}

#[tokio::test]
async fn test_resync_recovers_missed_messages_idempotently() {
    let ctx = TestContext::new();
    let group = free_group(&ctx, "owner", 5).await;
    let conversation = ConversationId::group(group.id);

    let session = ctx.services.create_session("owner", "Olive");
    session.open(conversation).await.unwrap();

    // append behind the live feed's back
    ctx.storage
        .messages
        .append(conversation, "owner", "Olive", "missed")
        .await
        .unwrap();

    let recovered = session.resync().await.unwrap();
    assert_eq!(recovered, 1);
    assert_eq!(session.backlog().len(), 1);

    // re-listing from the same state changes nothing
    let recovered = session.resync().await.unwrap();
    assert_eq!(recovered, 0);
    assert_eq!(session.backlog().len(), 1);
}

#[tokio::test]
async fn test_mark_read_tracks_cursor() {
    let ctx = TestContext::new();
    let group = free_group(&ctx, "owner", 5).await;
    let conversation = ConversationId::group(group.id);

    let session = ctx.services.create_session("owner", "Olive");
    session.open(conversation).await.unwrap();
    session.send("one").await.unwrap();
    session.send("two").await.unwrap();

    session.mark_read().await.unwrap();
    assert_eq!(
        ctx.services
            .message_log
            .unread_count(conversation, "owner")
            .await
            .unwrap(),
        0
    );

    ctx.services
        .message_log
        .append(conversation, "owner", "Olive", "three")
        .await
        .unwrap();
    assert_eq!(
        ctx.services
            .message_log
            .unread_count(conversation, "owner")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_send_requires_ready() {
    let ctx = TestContext::new();
    let group = free_group(&ctx, "owner", 5).await;
    let conversation = ConversationId::group(group.id);

    let session = ctx.services.create_session("owner", "Olive");
    assert_matches!(
        session.send("too early").await,
        Err(MentorLinkError::InvalidTransition { .. })
    );

    session.open(conversation).await.unwrap();
    session.close().await.unwrap();
    assert_matches!(
        session.send("too late").await,
        Err(MentorLinkError::SessionClosed)
    );
}

/// Message repository wrapper that parks appends on a gate, so tests can
/// close a session while a send is provably in flight.
struct GatedMessages {
    inner: Arc<MemoryStore>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl MessageRepository for GatedMessages {
    async fn append(
        &self,
        conversation: ConversationId,
        sender_id: &str,
        sender_name: &str,
        body: &str,
    ) -> Result<Message> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner
            .append(conversation, sender_id, sender_name, body)
            .await
    }

    async fn list_since(
        &self,
        conversation: ConversationId,
        after_seq: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        self.inner.list_since(conversation, after_seq, limit).await
    }

    async fn latest_seq(&self, conversation: ConversationId) -> Result<Option<i64>> {
        self.inner.latest_seq(conversation).await
    }

    async fn purge_conversation(&self, conversation: ConversationId) -> Result<u64> {
        self.inner.purge_conversation(conversation).await
    }

    async fn set_read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
        seq: i64,
    ) -> Result<()> {
        self.inner
            .set_read_position(conversation, user_id, seq)
            .await
    }

    async fn read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
    ) -> Result<Option<i64>> {
        self.inner.read_position(conversation, user_id).await
    }

    async fn unread_count(&self, conversation: ConversationId, user_id: &str) -> Result<i64> {
        self.inner.unread_count(conversation, user_id).await
    }
}

#[tokio::test]
async fn test_close_mid_send_discards_resolved_result() {
    let store = Arc::new(MemoryStore::new());
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let storage = Storage {
        connections: store.clone(),
        groups: store.clone(),
        messages: Arc::new(GatedMessages {
            inner: store.clone(),
            entered: entered.clone(),
            release: release.clone(),
        }),
        notifications: store.clone(),
    };
    let services = ServiceFactory::new(storage, Settings::default(), None).unwrap();

    let group = services
        .membership_service
        .create_group("owner", helpers::group_request(mentorlink::models::GroupKind::Free, 5))
        .await
        .unwrap();
    let conversation = ConversationId::group(group.id);

    let session = Arc::new(services.create_session("owner", "Olive"));
    session.open(conversation).await.unwrap();

    let sender = session.clone();
    let send_task = tokio::spawn(async move { sender.send("late message").await });

    // wait until the append is parked inside the store call
    entered.notified().await;

    // a second submit while one is in flight is refused
    assert_matches!(
        session.send("duplicate").await,
        Err(MentorLinkError::InvalidTransition { .. })
    );

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    // let the in-flight send resolve at the store level
    release.notify_one();
    let result = send_task.await.unwrap().unwrap();
    assert!(result.is_none(), "closed session must discard the send result");

    // the message exists in the store...
    let stored = store.list_since(conversation, None, 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].body, "late message");

    // ...but the session delivers nothing further
    assert!(session.recv_event().await.is_none());
    assert!(session.backlog().is_empty());
}
