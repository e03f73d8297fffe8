//! Repository traits and implementations
//!
//! Each store is defined as an async trait so the services can run against
//! PostgreSQL in production and the in-memory backend in tests. Every
//! check-then-mutate operation (status transitions, capacity checks, the
//! single-pending-request rule) is atomic inside the backend.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Connection, ConnectionRole, ConnectionStatus, CreateConnectionRequest, CreateGroupRequest,
    CreateNotificationRequest, ConversationId, Group, GroupParticipant, JoinRequest, Message,
    Notification,
};
use crate::utils::errors::Result;

pub mod connection;
pub mod group;
pub mod message;
pub mod notification;

pub use connection::PgConnectionRepository;
pub use group::PgGroupRepository;
pub use message::PgMessageRepository;
pub use notification::PgNotificationRepository;

/// Outcome of an atomic roster insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterChange {
    Added,
    AlreadyMember,
    Full,
}

/// Outcome of an atomic join-request creation
#[derive(Debug, Clone)]
pub enum JoinRequestOutcome {
    Created(JoinRequest),
    DuplicatePending,
}

/// Outcome of an atomic approve-and-enroll
#[derive(Debug, Clone)]
pub enum ApproveOutcome {
    Approved(JoinRequest),
    Full,
    NoPendingRequest,
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn create(&self, request: CreateConnectionRequest) -> Result<Connection>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Connection>>;

    /// Conditional status transition; returns `None` when the connection is
    /// not currently in `from`
    async fn transition(
        &self,
        id: Uuid,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> Result<Option<Connection>>;

    /// Atomically move `accepted -> active` and record the payment; returns
    /// `None` when the connection is not currently `accepted`
    async fn complete_payment(&self, id: Uuid, payment_ref: &str) -> Result<Option<Connection>>;

    /// Increment the session counter of an active connection
    async fn increment_session_count(&self, id: Uuid) -> Result<Option<Connection>>;

    async fn list_for_user(&self, user_id: &str, role: ConnectionRole) -> Result<Vec<Connection>>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Create the group and enroll the owner as its first participant
    async fn create(&self, owner_id: &str, request: CreateGroupRequest) -> Result<Group>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>>;

    /// Remove the group together with its roster and join requests; returns
    /// whether the group existed
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Capacity-checked, duplicate-checked roster insertion, atomic per group
    async fn add_participant(&self, group_id: Uuid, user_id: &str) -> Result<RosterChange>;

    /// Idempotent roster removal; returns whether a row was removed
    async fn remove_participant(&self, group_id: Uuid, user_id: &str) -> Result<bool>;

    async fn participants(&self, group_id: Uuid) -> Result<Vec<GroupParticipant>>;

    async fn participant_count(&self, group_id: Uuid) -> Result<i64>;

    async fn is_participant(&self, group_id: Uuid, user_id: &str) -> Result<bool>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Group>>;

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Group>>;

    /// Append a join request unless one is already pending for this user
    async fn create_join_request(
        &self,
        group_id: Uuid,
        user_id: &str,
        user_name: &str,
    ) -> Result<JoinRequestOutcome>;

    async fn pending_requests(&self, group_id: Uuid) -> Result<Vec<JoinRequest>>;

    /// Approve the pending request and enroll the user, re-checking capacity
    /// under the group lock; the request stays pending when the group is full
    async fn approve_request(&self, group_id: Uuid, user_id: &str) -> Result<ApproveOutcome>;

    /// Reject the pending request; returns `None` when no request is pending
    async fn reject_request(&self, group_id: Uuid, user_id: &str) -> Result<Option<JoinRequest>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message; the backend assigns `seq`
    async fn append(
        &self,
        conversation: ConversationId,
        sender_id: &str,
        sender_name: &str,
        body: &str,
    ) -> Result<Message>;

    /// Messages with `seq > after_seq`, ascending, capped at `limit`
    async fn list_since(
        &self,
        conversation: ConversationId,
        after_seq: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>>;

    async fn latest_seq(&self, conversation: ConversationId) -> Result<Option<i64>>;

    /// Drop a conversation's messages and read positions (group deletion)
    async fn purge_conversation(&self, conversation: ConversationId) -> Result<u64>;

    /// Monotonic read-cursor upsert; a stale `seq` never moves it backwards
    async fn set_read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
        seq: i64,
    ) -> Result<()>;

    async fn read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
    ) -> Result<Option<i64>>;

    async fn unread_count(&self, conversation: ConversationId, user_id: &str) -> Result<i64>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, request: CreateNotificationRequest) -> Result<Notification>;

    async fn list_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>>;

    async fn mark_read(&self, id: Uuid) -> Result<Notification>;
}
