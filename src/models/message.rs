//! Message and conversation models
//!
//! A conversation is the logical channel a message log belongs to: either the
//! 1:1 channel of a connection or the shared channel of a group. Messages are
//! append-only and totally ordered per conversation by a server-assigned
//! sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of channel a message log belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "conversation_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// 1:1 channel of a connection; the id is the connection id
    Personal,
    /// Shared channel of a group; the id is the group id
    Group,
}

/// Identity of a conversation, derived from the entity it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId {
    pub kind: ConversationKind,
    pub id: Uuid,
}

impl ConversationId {
    pub fn personal(connection_id: Uuid) -> Self {
        Self {
            kind: ConversationKind::Personal,
            id: connection_id,
        }
    }

    pub fn group(group_id: Uuid) -> Self {
        Self {
            kind: ConversationKind::Group,
            id: group_id,
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ConversationKind::Personal => write!(f, "personal:{}", self.id),
            ConversationKind::Group => write!(f, "group:{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_kind: ConversationKind,
    pub conversation_id: Uuid,
    /// Server-assigned sequence, strictly increasing per conversation
    pub seq: i64,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn conversation(&self) -> ConversationId {
        ConversationId {
            kind: self.conversation_kind,
            id: self.conversation_id,
        }
    }
}

/// Per-participant read cursor within a conversation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReadPosition {
    pub conversation_kind: ConversationKind,
    pub conversation_id: Uuid,
    pub user_id: String,
    pub last_read_seq: i64,
    pub updated_at: DateTime<Utc>,
}
