//! In-memory store backend
//!
//! Implements every repository trait over a single async lock, which makes
//! each check-then-mutate operation atomic the same way the PostgreSQL
//! backend's row locks do. Used by the test suite and by embedded
//! deployments that do not need durability.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::repositories::{
    ApproveOutcome, ConnectionRepository, GroupRepository, JoinRequestOutcome, MessageRepository,
    NotificationRepository, RosterChange,
};
use crate::models::{
    Connection, ConnectionRole, ConnectionStatus, CreateConnectionRequest, CreateGroupRequest,
    CreateNotificationRequest, ConversationId, Group, GroupParticipant, JoinRequest,
    JoinRequestStatus, Message, Notification, PaymentStatus,
};
use crate::utils::errors::{MentorLinkError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    connections: HashMap<Uuid, Connection>,
    groups: HashMap<Uuid, Group>,
    participants: HashMap<Uuid, Vec<GroupParticipant>>,
    join_requests: Vec<JoinRequest>,
    messages: HashMap<ConversationId, Vec<Message>>,
    read_positions: HashMap<(ConversationId, String), i64>,
    notifications: Vec<Notification>,
    next_seq: i64,
}

/// Lock-serialised store holding every entity in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRepository for MemoryStore {
    async fn create(&self, request: CreateConnectionRequest) -> Result<Connection> {
        let mut state = self.inner.write().await;
        let now = Utc::now();
        let connection = Connection {
            id: Uuid::new_v4(),
            entrepreneur_id: request.entrepreneur_id,
            mentor_id: request.mentor_id,
            mentor_kind: request.mentor_kind,
            status: ConnectionStatus::Pending,
            payment_status: PaymentStatus::Pending,
            request_message: request.request_message,
            payment_ref: None,
            session_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.connections.insert(connection.id, connection.clone());
        Ok(connection)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Connection>> {
        let state = self.inner.read().await;
        Ok(state.connections.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> Result<Option<Connection>> {
        let mut state = self.inner.write().await;
        match state.connections.get_mut(&id) {
            Some(connection) if connection.status == from => {
                connection.status = to;
                connection.updated_at = Utc::now();
                Ok(Some(connection.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn complete_payment(&self, id: Uuid, payment_ref: &str) -> Result<Option<Connection>> {
        let mut state = self.inner.write().await;
        match state.connections.get_mut(&id) {
            Some(connection) if connection.status == ConnectionStatus::Accepted => {
                connection.status = ConnectionStatus::Active;
                connection.payment_status = PaymentStatus::Completed;
                connection.payment_ref = Some(payment_ref.to_string());
                connection.updated_at = Utc::now();
                Ok(Some(connection.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn increment_session_count(&self, id: Uuid) -> Result<Option<Connection>> {
        let mut state = self.inner.write().await;
        match state.connections.get_mut(&id) {
            Some(connection) if connection.status == ConnectionStatus::Active => {
                connection.session_count += 1;
                connection.updated_at = Utc::now();
                Ok(Some(connection.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: &str, role: ConnectionRole) -> Result<Vec<Connection>> {
        let state = self.inner.read().await;
        let mut connections: Vec<Connection> = state
            .connections
            .values()
            .filter(|c| match role {
                ConnectionRole::Entrepreneur => c.entrepreneur_id == user_id,
                ConnectionRole::Mentor => c.mentor_id == user_id,
            })
            .cloned()
            .collect();
        connections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(connections)
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn create(&self, owner_id: &str, request: CreateGroupRequest) -> Result<Group> {
        let mut state = self.inner.write().await;
        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: request.name,
            kind: request.kind,
            max_participants: request.max_participants,
            price_cents: request.price_cents,
            created_at: now,
            updated_at: now,
        };
        state.participants.insert(
            group.id,
            vec![GroupParticipant {
                group_id: group.id,
                user_id: owner_id.to_string(),
                joined_at: now,
            }],
        );
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        let state = self.inner.read().await;
        Ok(state.groups.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.inner.write().await;
        let existed = state.groups.remove(&id).is_some();
        state.participants.remove(&id);
        state.join_requests.retain(|r| r.group_id != id);
        Ok(existed)
    }

    async fn add_participant(&self, group_id: Uuid, user_id: &str) -> Result<RosterChange> {
        let mut state = self.inner.write().await;
        let max_participants = state
            .groups
            .get(&group_id)
            .map(|g| g.max_participants)
            .ok_or(MentorLinkError::GroupNotFound { group_id })?;

        let roster = state.participants.entry(group_id).or_default();
        if roster.iter().any(|p| p.user_id == user_id) {
            return Ok(RosterChange::AlreadyMember);
        }
        if roster.len() as i64 >= max_participants as i64 {
            return Ok(RosterChange::Full);
        }
        roster.push(GroupParticipant {
            group_id,
            user_id: user_id.to_string(),
            joined_at: Utc::now(),
        });
        Ok(RosterChange::Added)
    }

    async fn remove_participant(&self, group_id: Uuid, user_id: &str) -> Result<bool> {
        let mut state = self.inner.write().await;
        let Some(roster) = state.participants.get_mut(&group_id) else {
            return Ok(false);
        };
        let before = roster.len();
        roster.retain(|p| p.user_id != user_id);
        Ok(roster.len() < before)
    }

    async fn participants(&self, group_id: Uuid) -> Result<Vec<GroupParticipant>> {
        let state = self.inner.read().await;
        Ok(state.participants.get(&group_id).cloned().unwrap_or_default())
    }

    async fn participant_count(&self, group_id: Uuid) -> Result<i64> {
        let state = self.inner.read().await;
        Ok(state
            .participants
            .get(&group_id)
            .map(|r| r.len() as i64)
            .unwrap_or(0))
    }

    async fn is_participant(&self, group_id: Uuid, user_id: &str) -> Result<bool> {
        let state = self.inner.read().await;
        Ok(state
            .participants
            .get(&group_id)
            .map(|r| r.iter().any(|p| p.user_id == user_id))
            .unwrap_or(false))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Group>> {
        let state = self.inner.read().await;
        let mut memberships: Vec<(Group, chrono::DateTime<Utc>)> = state
            .participants
            .iter()
            .filter_map(|(group_id, roster)| {
                let joined = roster.iter().find(|p| p.user_id == user_id)?;
                let group = state.groups.get(group_id)?;
                Some((group.clone(), joined.joined_at))
            })
            .collect();
        memberships.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(memberships.into_iter().map(|(group, _)| group).collect())
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Group>> {
        let state = self.inner.read().await;
        let mut groups: Vec<Group> = state
            .groups
            .values()
            .filter(|g| g.owner_id == owner_id)
            .cloned()
            .collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }

    async fn create_join_request(
        &self,
        group_id: Uuid,
        user_id: &str,
        user_name: &str,
    ) -> Result<JoinRequestOutcome> {
        let mut state = self.inner.write().await;
        if !state.groups.contains_key(&group_id) {
            return Err(MentorLinkError::GroupNotFound { group_id });
        }
        let duplicate = state.join_requests.iter().any(|r| {
            r.group_id == group_id
                && r.user_id == user_id
                && r.status == JoinRequestStatus::Pending
        });
        if duplicate {
            return Ok(JoinRequestOutcome::DuplicatePending);
        }
        let request = JoinRequest {
            id: Uuid::new_v4(),
            group_id,
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            status: JoinRequestStatus::Pending,
            requested_at: Utc::now(),
            decided_at: None,
        };
        state.join_requests.push(request.clone());
        Ok(JoinRequestOutcome::Created(request))
    }

    async fn pending_requests(&self, group_id: Uuid) -> Result<Vec<JoinRequest>> {
        let state = self.inner.read().await;
        Ok(state
            .join_requests
            .iter()
            .filter(|r| r.group_id == group_id && r.status == JoinRequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn approve_request(&self, group_id: Uuid, user_id: &str) -> Result<ApproveOutcome> {
        let mut state = self.inner.write().await;
        let max_participants = state
            .groups
            .get(&group_id)
            .map(|g| g.max_participants)
            .ok_or(MentorLinkError::GroupNotFound { group_id })?;

        let Some(index) = state.join_requests.iter().position(|r| {
            r.group_id == group_id
                && r.user_id == user_id
                && r.status == JoinRequestStatus::Pending
        }) else {
            return Ok(ApproveOutcome::NoPendingRequest);
        };

        let roster_len = state
            .participants
            .get(&group_id)
            .map(|r| r.len())
            .unwrap_or(0);
        if roster_len as i64 >= max_participants as i64 {
            return Ok(ApproveOutcome::Full);
        }

        let request = {
            let request = &mut state.join_requests[index];
            request.status = JoinRequestStatus::Approved;
            request.decided_at = Some(Utc::now());
            request.clone()
        };

        let roster = state.participants.entry(group_id).or_default();
        if !roster.iter().any(|p| p.user_id == user_id) {
            roster.push(GroupParticipant {
                group_id,
                user_id: user_id.to_string(),
                joined_at: Utc::now(),
            });
        }
        Ok(ApproveOutcome::Approved(request))
    }

    async fn reject_request(&self, group_id: Uuid, user_id: &str) -> Result<Option<JoinRequest>> {
        let mut state = self.inner.write().await;
        let Some(request) = state.join_requests.iter_mut().find(|r| {
            r.group_id == group_id
                && r.user_id == user_id
                && r.status == JoinRequestStatus::Pending
        }) else {
            return Ok(None);
        };
        request.status = JoinRequestStatus::Rejected;
        request.decided_at = Some(Utc::now());
        Ok(Some(request.clone()))
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn append(
        &self,
        conversation: ConversationId,
        sender_id: &str,
        sender_name: &str,
        body: &str,
    ) -> Result<Message> {
        let mut state = self.inner.write().await;
        state.next_seq += 1;
        let message = Message {
            id: Uuid::new_v4(),
            conversation_kind: conversation.kind,
            conversation_id: conversation.id,
            seq: state.next_seq,
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
        };
        state
            .messages
            .entry(conversation)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_since(
        &self,
        conversation: ConversationId,
        after_seq: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let state = self.inner.read().await;
        let cursor = after_seq.unwrap_or(0);
        Ok(state
            .messages
            .get(&conversation)
            .map(|log| {
                log.iter()
                    .filter(|m| m.seq > cursor)
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn latest_seq(&self, conversation: ConversationId) -> Result<Option<i64>> {
        let state = self.inner.read().await;
        Ok(state
            .messages
            .get(&conversation)
            .and_then(|log| log.last().map(|m| m.seq)))
    }

    async fn purge_conversation(&self, conversation: ConversationId) -> Result<u64> {
        let mut state = self.inner.write().await;
        let removed = state
            .messages
            .remove(&conversation)
            .map(|log| log.len() as u64)
            .unwrap_or(0);
        state
            .read_positions
            .retain(|(c, _), _| *c != conversation);
        Ok(removed)
    }

    async fn set_read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
        seq: i64,
    ) -> Result<()> {
        let mut state = self.inner.write().await;
        let entry = state
            .read_positions
            .entry((conversation, user_id.to_string()))
            .or_insert(0);
        *entry = (*entry).max(seq);
        Ok(())
    }

    async fn read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
    ) -> Result<Option<i64>> {
        let state = self.inner.read().await;
        Ok(state
            .read_positions
            .get(&(conversation, user_id.to_string()))
            .copied())
    }

    async fn unread_count(&self, conversation: ConversationId, user_id: &str) -> Result<i64> {
        let state = self.inner.read().await;
        let cursor = state
            .read_positions
            .get(&(conversation, user_id.to_string()))
            .copied()
            .unwrap_or(0);
        Ok(state
            .messages
            .get(&conversation)
            .map(|log| log.iter().filter(|m| m.seq > cursor).count() as i64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(&self, request: CreateNotificationRequest) -> Result<Notification> {
        let mut state = self.inner.write().await;
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            title: request.title,
            body: request.body,
            link: request.link,
            read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let state = self.inner.read().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid) -> Result<Notification> {
        let mut state = self.inner.write().await;
        let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) else {
            return Err(MentorLinkError::NotificationNotFound { notification_id: id });
        };
        notification.read = true;
        Ok(notification.clone())
    }
}
