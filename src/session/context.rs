//! Chat session context
//!
//! The persisted view state of one user's chat session: which conversation
//! is open and how far the user has read. Stored in Redis with a TTL so a
//! reopened session can resume its cursor.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ConversationId;

/// Persisted session context for one (user, conversation) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionContext {
    /// User this context belongs to
    pub user_id: String,
    /// Conversation the session is attached to
    pub conversation: ConversationId,
    /// Highest message sequence the user has seen
    pub cursor: i64,
    /// When the session was first opened
    pub opened_at: DateTime<Utc>,
    /// When this context was last updated
    pub updated_at: DateTime<Utc>,
    /// When this context expires (for cleanup)
    pub expires_at: Option<DateTime<Utc>>,
}

impl ChatSessionContext {
    /// Create a fresh context for a user opening a conversation
    pub fn new(user_id: &str, conversation: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            conversation,
            cursor: 0,
            opened_at: now,
            updated_at: now,
            expires_at: Some(now + Duration::hours(24)),
        }
    }

    /// Advance the cursor; a stale sequence never moves it backwards
    pub fn advance_cursor(&mut self, seq: i64) {
        if seq > self.cursor {
            self.cursor = seq;
            self.updated_at = Utc::now();
        }
    }

    /// Check if the context has expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }

    /// Set a custom expiry time
    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
        self.updated_at = Utc::now();
    }
}
