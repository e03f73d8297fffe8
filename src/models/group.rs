//! Group and join request models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Join policy of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "group_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// Anyone joins directly, subject to capacity
    Free,
    /// Joining requires an owner-approved request
    SelfHelp,
    /// Joining requires a verified payment reference
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub kind: GroupKind,
    pub max_participants: i32,
    pub price_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupParticipant {
    pub group_id: Uuid,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// Decision state of a join request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "join_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JoinRequest {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub kind: GroupKind,
    pub max_participants: i32,
    pub price_cents: Option<i64>,
}

impl CreateGroupRequest {
    /// Validate the request shape before it reaches the store
    pub fn validate(&self) -> crate::utils::errors::Result<()> {
        use crate::utils::errors::MentorLinkError;

        if self.name.trim().is_empty() {
            return Err(MentorLinkError::InvalidInput(
                "group name must not be empty".to_string(),
            ));
        }
        if self.max_participants < 2 {
            return Err(MentorLinkError::InvalidInput(format!(
                "max_participants must be at least 2, got {}",
                self.max_participants
            )));
        }
        match (self.kind, self.price_cents) {
            (GroupKind::Paid, None) => Err(MentorLinkError::InvalidInput(
                "paid groups require a price".to_string(),
            )),
            (GroupKind::Paid, Some(p)) if p <= 0 => Err(MentorLinkError::InvalidInput(
                "paid groups require a positive price".to_string(),
            )),
            (GroupKind::Free | GroupKind::SelfHelp, Some(_)) => Err(MentorLinkError::InvalidInput(
                "only paid groups carry a price".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
