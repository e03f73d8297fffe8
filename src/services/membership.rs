//! Group membership service implementation
//!
//! This service owns group creation, the kind-dependent join policies
//! (direct join, request/approve, paid enrollment), leaving, and group
//! deletion. The roster and its capacity are only ever mutated through the
//! store's atomic operations.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::repositories::{
    ApproveOutcome, GroupRepository, JoinRequestOutcome, MessageRepository, RosterChange,
};
use crate::models::{
    ConversationId, CreateGroupRequest, Group, GroupKind, GroupParticipant, JoinRequest,
};
use crate::services::notification::NotificationService;
use crate::services::payment::PaymentService;
use crate::utils::errors::{MentorLinkError, Result};

/// Membership service for managing groups and their rosters
#[derive(Clone)]
pub struct MembershipService {
    groups: Arc<dyn GroupRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: NotificationService,
    payments: PaymentService,
}

impl MembershipService {
    /// Create a new MembershipService instance
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        messages: Arc<dyn MessageRepository>,
        notifications: NotificationService,
        payments: PaymentService,
    ) -> Self {
        Self {
            groups,
            messages,
            notifications,
            payments,
        }
    }

    /// Create a group; the owner is enrolled as its first participant
    pub async fn create_group(&self, owner_id: &str, request: CreateGroupRequest) -> Result<Group> {
        request.validate()?;

        let group = self.groups.create(owner_id, request).await?;
        info!(group_id = %group.id, owner_id = %owner_id, kind = ?group.kind, "Group created");

        Ok(group)
    }

    /// Direct join for free groups
    pub async fn join_free(&self, group_id: Uuid, user_id: &str) -> Result<()> {
        let group = self.require(group_id).await?;

        if group.kind != GroupKind::Free {
            return Err(MentorLinkError::PermissionDenied(format!(
                "group {} does not allow direct joins",
                group_id
            )));
        }

        self.admit(&group, user_id).await
    }

    /// Enrollment for paid groups, gated on a verified payment reference
    pub async fn enroll_paid(&self, group_id: Uuid, user_id: &str, payment_ref: &str) -> Result<()> {
        let group = self.require(group_id).await?;

        if group.kind != GroupKind::Paid {
            return Err(MentorLinkError::PermissionDenied(format!(
                "group {} is not a paid group",
                group_id
            )));
        }

        if !self.payments.verify(payment_ref).await? {
            return Err(MentorLinkError::PaymentRejected(payment_ref.to_string()));
        }

        self.admit(&group, user_id).await
    }

    /// Request membership in a self-help group
    pub async fn request_join(
        &self,
        group_id: Uuid,
        user_id: &str,
        user_name: &str,
    ) -> Result<JoinRequest> {
        let group = self.require(group_id).await?;

        if group.kind != GroupKind::SelfHelp {
            return Err(MentorLinkError::PermissionDenied(format!(
                "group {} does not take join requests",
                group_id
            )));
        }

        if self.groups.is_participant(group_id, user_id).await? {
            return Err(MentorLinkError::AlreadyMember {
                group_id,
                user_id: user_id.to_string(),
            });
        }

        match self
            .groups
            .create_join_request(group_id, user_id, user_name)
            .await?
        {
            JoinRequestOutcome::Created(request) => {
                info!(group_id = %group_id, user_id = %user_id, "Join request created");
                self.notifications.join_requested(&group, &request).await;
                Ok(request)
            }
            JoinRequestOutcome::DuplicatePending => {
                debug!(group_id = %group_id, user_id = %user_id, "Duplicate pending join request");
                Err(MentorLinkError::DuplicateJoinRequest {
                    group_id,
                    user_id: user_id.to_string(),
                })
            }
        }
    }

    /// Owner approves a pending join request; capacity is re-checked at
    /// approval time, not reserved at request time
    pub async fn approve_request(
        &self,
        group_id: Uuid,
        user_id: &str,
        actor_id: &str,
    ) -> Result<JoinRequest> {
        let group = self.require_owner(group_id, actor_id, "approve join requests").await?;

        match self.groups.approve_request(group_id, user_id).await? {
            ApproveOutcome::Approved(request) => {
                info!(group_id = %group_id, user_id = %user_id, "Join request approved");
                self.notifications.join_approved(&group, user_id).await;
                Ok(request)
            }
            ApproveOutcome::Full => {
                warn!(group_id = %group_id, user_id = %user_id, "Approval refused: group is full");
                Err(MentorLinkError::GroupFull {
                    group_id,
                    max_participants: group.max_participants,
                })
            }
            ApproveOutcome::NoPendingRequest => Err(MentorLinkError::InvalidTransition {
                from: "absent".to_string(),
                to: "approved".to_string(),
            }),
        }
    }

    /// Owner rejects a pending join request
    pub async fn reject_request(
        &self,
        group_id: Uuid,
        user_id: &str,
        actor_id: &str,
    ) -> Result<JoinRequest> {
        let group = self.require_owner(group_id, actor_id, "reject join requests").await?;

        let request = self
            .groups
            .reject_request(group_id, user_id)
            .await?
            .ok_or_else(|| MentorLinkError::InvalidTransition {
                from: "absent".to_string(),
                to: "rejected".to_string(),
            })?;

        info!(group_id = %group_id, user_id = %user_id, "Join request rejected");
        self.notifications.join_rejected(&group, user_id).await;

        Ok(request)
    }

    /// Pending join requests, visible to the owner only
    pub async fn pending_requests(&self, group_id: Uuid, actor_id: &str) -> Result<Vec<JoinRequest>> {
        self.require_owner(group_id, actor_id, "list join requests").await?;
        self.groups.pending_requests(group_id).await
    }

    /// Leave a group; idempotent, but the owner must delete instead
    pub async fn leave(&self, group_id: Uuid, user_id: &str) -> Result<()> {
        let group = self.require(group_id).await?;

        if group.owner_id == user_id {
            return Err(MentorLinkError::PermissionDenied(
                "the owner cannot leave their own group".to_string(),
            ));
        }

        let removed = self.groups.remove_participant(group_id, user_id).await?;
        if removed {
            info!(group_id = %group_id, user_id = %user_id, "Participant left group");
        } else {
            debug!(group_id = %group_id, user_id = %user_id, "Leave was a no-op");
        }

        Ok(())
    }

    /// Delete a group and its message log
    pub async fn delete_group(&self, group_id: Uuid, actor_id: &str) -> Result<()> {
        self.require_owner(group_id, actor_id, "delete the group").await?;

        let purged = self
            .messages
            .purge_conversation(ConversationId::group(group_id))
            .await?;
        self.groups.delete(group_id).await?;

        info!(group_id = %group_id, purged_messages = purged, "Group deleted");
        Ok(())
    }

    /// Get one group
    pub async fn get_group(&self, group_id: Uuid) -> Result<Option<Group>> {
        self.groups.find_by_id(group_id).await
    }

    /// Groups the user participates in
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Group>> {
        self.groups.list_for_user(user_id).await
    }

    /// Groups the user owns
    pub async fn list_owned(&self, owner_id: &str) -> Result<Vec<Group>> {
        self.groups.list_owned(owner_id).await
    }

    /// Current roster of a group
    pub async fn participants(&self, group_id: Uuid) -> Result<Vec<GroupParticipant>> {
        self.groups.participants(group_id).await
    }

    /// Whether a user is on the roster
    pub async fn is_participant(&self, group_id: Uuid, user_id: &str) -> Result<bool> {
        self.groups.is_participant(group_id, user_id).await
    }

    async fn admit(&self, group: &Group, user_id: &str) -> Result<()> {
        match self.groups.add_participant(group.id, user_id).await? {
            RosterChange::Added => {
                info!(group_id = %group.id, user_id = %user_id, "Participant joined group");
                Ok(())
            }
            RosterChange::AlreadyMember => Err(MentorLinkError::AlreadyMember {
                group_id: group.id,
                user_id: user_id.to_string(),
            }),
            RosterChange::Full => Err(MentorLinkError::GroupFull {
                group_id: group.id,
                max_participants: group.max_participants,
            }),
        }
    }

    async fn require(&self, group_id: Uuid) -> Result<Group> {
        self.groups
            .find_by_id(group_id)
            .await?
            .ok_or(MentorLinkError::GroupNotFound { group_id })
    }

    async fn require_owner(&self, group_id: Uuid, actor_id: &str, action: &str) -> Result<Group> {
        let group = self.require(group_id).await?;
        if group.owner_id != actor_id {
            warn!(group_id = %group_id, actor_id = %actor_id, "Owner-only action denied");
            return Err(MentorLinkError::PermissionDenied(format!(
                "only the owner may {}",
                action
            )));
        }
        Ok(group)
    }
}
