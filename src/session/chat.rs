//! Chat session state machine
//!
//! The live controller between a UI and one conversation. A session walks
//! `Idle -> Loading -> Ready -> (Sending)* -> Closed`: opening resolves the
//! conversation and loads the backlog, `Ready` receives live messages and
//! accepts sends, and closing tears the subscription down so nothing is
//! delivered afterwards. Methods take `&self`, so a UI can hold the session
//! in an `Arc` and close it while a send is in flight.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::context::ChatSessionContext;
use super::storage::SessionStorage;
use crate::models::{ConversationId, ConversationKind, GroupKind, Message};
use crate::services::membership::MembershipService;
use crate::services::message_log::MessageLogService;
use crate::utils::errors::{MentorLinkError, Result};

/// Lifecycle state of a chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Sending,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Sending => "sending",
            SessionState::Closed => "closed",
        }
    }
}

/// Events delivered to the session's consumer while it is `Ready`
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A newly appended message
    Message(Message),
    /// The subscription fell behind; `resync` recovers the gap
    Lagged { skipped: u64 },
}

struct SessionInner {
    state: SessionState,
    conversation: Option<ConversationId>,
    backlog: Vec<Message>,
    last_seq: i64,
    pump: Option<JoinHandle<()>>,
}

/// Live chat session for one user and one conversation
pub struct ChatSession {
    user_id: String,
    user_name: String,
    message_log: Arc<MessageLogService>,
    membership: Arc<MembershipService>,
    session_storage: Option<Arc<SessionStorage>>,
    inner: Mutex<SessionInner>,
    events: tokio::sync::Mutex<Option<mpsc::Receiver<SessionEvent>>>,
}

impl ChatSession {
    /// Create a detached session in `Idle`
    pub fn new(
        user_id: &str,
        user_name: &str,
        message_log: Arc<MessageLogService>,
        membership: Arc<MembershipService>,
        session_storage: Option<Arc<SessionStorage>>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            message_log,
            membership,
            session_storage,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                conversation: None,
                backlog: Vec::new(),
                last_seq: 0,
                pump: None,
            }),
            events: tokio::sync::Mutex::new(None),
        }
    }

    /// Attach to a conversation: `Idle -> Loading -> Ready`
    ///
    /// For group conversations the caller is auto-enrolled on first open when
    /// the group joins freely; request-gated and paid groups refuse instead.
    pub async fn open(&self, conversation: ConversationId) -> Result<()> {
        {
            let mut inner = self.lock_inner();
            if inner.state != SessionState::Idle {
                return Err(MentorLinkError::InvalidTransition {
                    from: inner.state.as_str().to_string(),
                    to: SessionState::Loading.as_str().to_string(),
                });
            }
            inner.state = SessionState::Loading;
        }

        match self.load(conversation).await {
            Ok(()) => {
                info!(user_id = %self.user_id, conversation = %conversation, "Chat session ready");
                Ok(())
            }
            Err(e) => {
                let mut inner = self.lock_inner();
                if inner.state == SessionState::Loading {
                    inner.state = SessionState::Idle;
                }
                Err(e)
            }
        }
    }

    async fn load(&self, conversation: ConversationId) -> Result<()> {
        if conversation.kind == ConversationKind::Group {
            self.provision_membership(conversation).await?;
        }
        self.message_log
            .authorize_participant(conversation, &self.user_id)
            .await?;

        // resume the saved read cursor when one exists; session storage
        // being down only costs the resume, not the open
        let mut saved_cursor = 0;
        if let Some(storage) = &self.session_storage {
            match storage.load_context(&self.user_id, conversation).await {
                Ok(Some(context)) => saved_cursor = context.cursor,
                Ok(None) => {}
                Err(e) => {
                    warn!(user_id = %self.user_id, error = %e, "Failed to load session context");
                }
            }
        }

        // subscribe before fetching the backlog so nothing falls in the gap;
        // messages that show up in both are deduplicated on delivery
        let stream = self.message_log.subscribe(conversation);

        let backlog = self.message_log.list_since(conversation, None).await?;
        let last_seq = backlog.last().map(|m| m.seq).unwrap_or(0);

        let (tx, rx) = mpsc::channel(64);
        let pump = tokio::spawn(async move {
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                let event = match item {
                    Ok(message) => SessionEvent::Message(message),
                    Err(MentorLinkError::SubscriptionLagged { skipped }) => {
                        SessionEvent::Lagged { skipped }
                    }
                    Err(_) => break,
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        *self.events.lock().await = Some(rx);

        let mut inner = self.lock_inner();
        inner.state = SessionState::Ready;
        inner.conversation = Some(conversation);
        inner.backlog = backlog;
        inner.last_seq = last_seq.max(saved_cursor);
        inner.pump = Some(pump);
        Ok(())
    }

    /// First-open side effect: enroll the caller in a freely joinable group
    async fn provision_membership(&self, conversation: ConversationId) -> Result<()> {
        let group = self
            .membership
            .get_group(conversation.id)
            .await?
            .ok_or(MentorLinkError::GroupNotFound {
                group_id: conversation.id,
            })?;

        if self.membership.is_participant(group.id, &self.user_id).await? {
            return Ok(());
        }

        if group.kind == GroupKind::Free {
            debug!(user_id = %self.user_id, group_id = %group.id, "Auto-enrolling on first open");
            self.membership.join_free(group.id, &self.user_id).await
        } else {
            Err(MentorLinkError::PermissionDenied(format!(
                "user {} is not a participant of group {}",
                self.user_id, group.id
            )))
        }
    }

    /// Send a message: `Ready -> Sending -> Ready`
    ///
    /// Returns `Ok(None)` when the session was closed while the send was in
    /// flight; the store-level result is discarded in that case.
    pub async fn send(&self, body: &str) -> Result<Option<Message>> {
        let conversation = {
            let mut inner = self.lock_inner();
            match inner.state {
                SessionState::Ready => {}
                SessionState::Closed => return Err(MentorLinkError::SessionClosed),
                state => {
                    return Err(MentorLinkError::InvalidTransition {
                        from: state.as_str().to_string(),
                        to: SessionState::Sending.as_str().to_string(),
                    })
                }
            }
            let Some(conversation) = inner.conversation else {
                return Err(MentorLinkError::InvalidTransition {
                    from: SessionState::Ready.as_str().to_string(),
                    to: SessionState::Sending.as_str().to_string(),
                });
            };
            inner.state = SessionState::Sending;
            conversation
        };

        let result = self
            .message_log
            .append(conversation, &self.user_id, &self.user_name, body)
            .await;

        let mut inner = self.lock_inner();
        if inner.state == SessionState::Closed {
            debug!(user_id = %self.user_id, "Send resolved after close, discarding result");
            return Ok(None);
        }
        inner.state = SessionState::Ready;

        match result {
            Ok(message) => {
                Self::insert_message(&mut inner, message.clone());
                Ok(Some(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Next live event; `None` once the session is closed
    pub async fn recv_event(&self) -> Option<SessionEvent> {
        loop {
            let event = {
                let mut guard = self.events.lock().await;
                let rx = guard.as_mut()?;
                rx.recv().await
            };

            match event {
                None => return None,
                Some(SessionEvent::Message(message)) => {
                    let mut inner = self.lock_inner();
                    if inner.state == SessionState::Closed {
                        return None;
                    }
                    // own sends come back through the subscription; drop them
                    if !Self::insert_message(&mut inner, message.clone()) {
                        continue;
                    }
                    return Some(SessionEvent::Message(message));
                }
                Some(lagged) => {
                    if self.lock_inner().state == SessionState::Closed {
                        return None;
                    }
                    return Some(lagged);
                }
            }
        }
    }

    /// Refetch the backlog and merge anything the live feed missed
    pub async fn resync(&self) -> Result<usize> {
        let conversation = {
            let inner = self.lock_inner();
            if inner.state != SessionState::Ready {
                return Err(MentorLinkError::InvalidTransition {
                    from: inner.state.as_str().to_string(),
                    to: SessionState::Ready.as_str().to_string(),
                });
            }
            inner.conversation
        };
        let Some(conversation) = conversation else {
            return Ok(0);
        };

        let messages = self.message_log.list_since(conversation, None).await?;

        let mut inner = self.lock_inner();
        if inner.state == SessionState::Closed {
            return Err(MentorLinkError::SessionClosed);
        }
        let mut recovered = 0;
        for message in messages {
            if Self::insert_message(&mut inner, message) {
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// Mark everything delivered so far as read and persist the cursor
    pub async fn mark_read(&self) -> Result<()> {
        let (conversation, last_seq) = {
            let inner = self.lock_inner();
            match (inner.conversation, inner.state) {
                (Some(conversation), SessionState::Ready | SessionState::Sending) => {
                    (conversation, inner.last_seq)
                }
                (_, SessionState::Closed) => return Err(MentorLinkError::SessionClosed),
                (_, state) => {
                    return Err(MentorLinkError::InvalidTransition {
                        from: state.as_str().to_string(),
                        to: SessionState::Ready.as_str().to_string(),
                    })
                }
            }
        };

        if last_seq > 0 {
            self.message_log
                .mark_read(conversation, &self.user_id, last_seq)
                .await?;
        }
        self.persist_context(conversation, last_seq).await;
        Ok(())
    }

    /// Tear the session down; reachable from every state
    pub async fn close(&self) -> Result<()> {
        let (conversation, last_seq, was_closed) = {
            let mut inner = self.lock_inner();
            let was_closed = inner.state == SessionState::Closed;
            inner.state = SessionState::Closed;
            if let Some(pump) = inner.pump.take() {
                pump.abort();
            }
            (inner.conversation, inner.last_seq, was_closed)
        };

        if was_closed {
            return Ok(());
        }

        if let Some(conversation) = conversation {
            self.persist_context(conversation, last_seq).await;
            info!(user_id = %self.user_id, conversation = %conversation, "Chat session closed");
        }

        Ok(())
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.lock_inner().state
    }

    /// Conversation the session is attached to, if any
    pub fn conversation(&self) -> Option<ConversationId> {
        self.lock_inner().conversation
    }

    /// Snapshot of the delivered backlog, ascending by sequence
    pub fn backlog(&self) -> Vec<Message> {
        self.lock_inner().backlog.clone()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn persist_context(&self, conversation: ConversationId, cursor: i64) {
        let Some(storage) = &self.session_storage else {
            return;
        };
        let mut context = ChatSessionContext::new(&self.user_id, conversation);
        context.advance_cursor(cursor);
        if let Err(e) = storage.save_context(&context).await {
            warn!(user_id = %self.user_id, error = %e, "Failed to persist session context");
        }
    }

    /// Insert preserving sequence order; returns false for duplicates
    fn insert_message(inner: &mut SessionInner, message: Message) -> bool {
        match inner.backlog.binary_search_by_key(&message.seq, |m| m.seq) {
            Ok(_) => false,
            Err(position) => {
                inner.last_seq = inner.last_seq.max(message.seq);
                inner.backlog.insert(position, message);
                true
            }
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session state lock poisoned")
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock_inner();
        f.debug_struct("ChatSession")
            .field("user_id", &self.user_id)
            .field("state", &inner.state)
            .field("conversation", &inner.conversation)
            .field("backlog_len", &inner.backlog.len())
            .finish_non_exhaustive()
    }
}
