//! Message log service implementation
//!
//! Append-only ordered chat per conversation. The store assigns each message
//! a sequence number; this service authorizes senders against the resolved
//! conversation, serialises the insert-then-publish path per conversation so
//! the live feed never reorders, and applies a per-sender send quota.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use futures::Stream;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::database::repositories::{ConnectionRepository, GroupRepository, MessageRepository};
use crate::models::{ConnectionStatus, ConversationId, ConversationKind, Message};
use crate::utils::errors::{MentorLinkError, Result};

type SenderLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-conversation fan-out channel plus the lock serialising appends
#[derive(Clone)]
struct ConversationChannel {
    tx: broadcast::Sender<Message>,
    append_lock: Arc<tokio::sync::Mutex<()>>,
}

/// Message log service for appending, listing and subscribing to chat
#[derive(Clone)]
pub struct MessageLogService {
    messages: Arc<dyn MessageRepository>,
    connections: Arc<dyn ConnectionRepository>,
    groups: Arc<dyn GroupRepository>,
    channels: Arc<Mutex<HashMap<ConversationId, ConversationChannel>>>,
    limiter: Arc<SenderLimiter>,
    config: ChatConfig,
}

impl MessageLogService {
    /// Create a new MessageLogService instance
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        connections: Arc<dyn ConnectionRepository>,
        groups: Arc<dyn GroupRepository>,
        config: ChatConfig,
    ) -> Self {
        let quota = NonZeroU32::new(config.sends_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            messages,
            connections,
            groups,
            channels: Arc::new(Mutex::new(HashMap::new())),
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(quota))),
            config,
        }
    }

    /// Append a message to a conversation
    pub async fn append(
        &self,
        conversation: ConversationId,
        sender_id: &str,
        sender_name: &str,
        body: &str,
    ) -> Result<Message> {
        let body = body.trim();
        if body.is_empty() {
            return Err(MentorLinkError::InvalidInput(
                "message body must not be empty".to_string(),
            ));
        }

        self.authorize_participant(conversation, sender_id).await?;

        if self.limiter.check_key(&sender_id.to_string()).is_err() {
            warn!(conversation = %conversation, sender_id = %sender_id, "Send quota exhausted");
            return Err(MentorLinkError::RateLimitExceeded);
        }

        let channel = self.channel(conversation);

        // hold the per-conversation lock across insert and publish so the
        // live feed observes messages in sequence order
        let _guard = channel.append_lock.lock().await;
        let message = match self
            .messages
            .append(conversation, sender_id, sender_name, body)
            .await
        {
            Ok(message) => message,
            Err(MentorLinkError::Database(e)) => {
                return Err(MentorLinkError::SendFailed(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        // delivery failure here only means nobody is subscribed
        let _ = channel.tx.send(message.clone());

        debug!(conversation = %conversation, seq = message.seq, sender_id = %sender_id, "Message appended");
        Ok(message)
    }

    /// Messages after the cursor, ascending; `None` lists from the start
    pub async fn list_since(
        &self,
        conversation: ConversationId,
        after_seq: Option<i64>,
    ) -> Result<Vec<Message>> {
        self.messages
            .list_since(conversation, after_seq, self.config.backlog_limit)
            .await
    }

    /// Live feed of newly appended messages for a conversation
    ///
    /// A slow subscriber observes a recoverable `SubscriptionLagged` item and
    /// the stream continues with the messages that are still buffered;
    /// already delivered messages are never reordered.
    pub fn subscribe(
        &self,
        conversation: ConversationId,
    ) -> impl Stream<Item = Result<Message>> + Send {
        let mut rx = self.channel(conversation).tx.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(message) => yield Ok(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        yield Err(MentorLinkError::SubscriptionLagged { skipped });
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Advance a participant's read cursor; never moves backwards
    pub async fn mark_read(
        &self,
        conversation: ConversationId,
        user_id: &str,
        seq: i64,
    ) -> Result<()> {
        self.messages
            .set_read_position(conversation, user_id, seq)
            .await
    }

    /// A participant's read cursor, if any
    pub async fn read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
    ) -> Result<Option<i64>> {
        self.messages.read_position(conversation, user_id).await
    }

    /// Messages beyond the participant's read cursor
    pub async fn unread_count(&self, conversation: ConversationId, user_id: &str) -> Result<i64> {
        self.messages.unread_count(conversation, user_id).await
    }

    /// Check that a user belongs to the conversation's backing entity
    pub async fn authorize_participant(
        &self,
        conversation: ConversationId,
        user_id: &str,
    ) -> Result<()> {
        match conversation.kind {
            ConversationKind::Personal => {
                let connection = self
                    .connections
                    .find_by_id(conversation.id)
                    .await?
                    .ok_or(MentorLinkError::ConnectionNotFound {
                        connection_id: conversation.id,
                    })?;
                if !connection.has_participant(user_id) {
                    return Err(MentorLinkError::PermissionDenied(format!(
                        "user {} is not part of conversation {}",
                        user_id, conversation
                    )));
                }
                if connection.status == ConnectionStatus::Rejected {
                    return Err(MentorLinkError::PermissionDenied(format!(
                        "conversation {} belongs to a rejected connection",
                        conversation
                    )));
                }
            }
            ConversationKind::Group => {
                self.groups
                    .find_by_id(conversation.id)
                    .await?
                    .ok_or(MentorLinkError::GroupNotFound {
                        group_id: conversation.id,
                    })?;
                if !self.groups.is_participant(conversation.id, user_id).await? {
                    return Err(MentorLinkError::PermissionDenied(format!(
                        "user {} is not part of conversation {}",
                        user_id, conversation
                    )));
                }
            }
        }
        Ok(())
    }

    fn channel(&self, conversation: ConversationId) -> ConversationChannel {
        let mut channels = self.channels.lock().expect("channel registry poisoned");
        channels
            .entry(conversation)
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(self.config.broadcast_capacity);
                ConversationChannel {
                    tx,
                    append_lock: Arc::new(tokio::sync::Mutex::new(())),
                }
            })
            .clone()
    }
}
