//! Connection model
//!
//! A connection is a mentoring relationship between one entrepreneur and one
//! mentor, carrying the request/accept/payment lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of mentoring the connection requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "mentor_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MentorKind {
    Personal,
    Group,
}

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "connection_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Active,
    Rejected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Active => "active",
            ConnectionStatus::Rejected => "rejected",
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionStatus::Active | ConnectionStatus::Rejected)
    }
}

/// Payment state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

/// Which side of a connection a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRole {
    Entrepreneur,
    Mentor,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Connection {
    pub id: Uuid,
    pub entrepreneur_id: String,
    pub mentor_id: String,
    pub mentor_kind: MentorKind,
    pub status: ConnectionStatus,
    pub payment_status: PaymentStatus,
    pub request_message: Option<String>,
    pub payment_ref: Option<String>,
    pub session_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// Whether a user belongs to this connection
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.entrepreneur_id == user_id || self.mentor_id == user_id
    }

    /// Invariant: a personal connection can only be active once paid
    pub fn payment_invariant_holds(&self) -> bool {
        if self.mentor_kind == MentorKind::Personal && self.status == ConnectionStatus::Active {
            self.payment_status == PaymentStatus::Completed
        } else {
            true
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConnectionRequest {
    pub entrepreneur_id: String,
    pub mentor_id: String,
    pub mentor_kind: MentorKind,
    pub request_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: MentorKind, status: ConnectionStatus, payment: PaymentStatus) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            entrepreneur_id: "e1".to_string(),
            mentor_id: "m1".to_string(),
            mentor_kind: kind,
            status,
            payment_status: payment,
            request_message: Some("Need help".to_string()),
            payment_ref: None,
            session_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_participant_check() {
        let conn = sample(
            MentorKind::Personal,
            ConnectionStatus::Pending,
            PaymentStatus::Pending,
        );
        assert!(conn.has_participant("e1"));
        assert!(conn.has_participant("m1"));
        assert!(!conn.has_participant("u9"));
    }

    #[test]
    fn test_payment_invariant() {
        let ok = sample(
            MentorKind::Personal,
            ConnectionStatus::Active,
            PaymentStatus::Completed,
        );
        assert!(ok.payment_invariant_holds());

        let broken = sample(
            MentorKind::Personal,
            ConnectionStatus::Active,
            PaymentStatus::Pending,
        );
        assert!(!broken.payment_invariant_holds());

        // group mentoring may go active without a payment record
        let group = sample(
            MentorKind::Group,
            ConnectionStatus::Active,
            PaymentStatus::Pending,
        );
        assert!(group.payment_invariant_holds());
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionStatus::Active.is_terminal());
        assert!(ConnectionStatus::Rejected.is_terminal());
        assert!(!ConnectionStatus::Pending.is_terminal());
        assert!(!ConnectionStatus::Accepted.is_terminal());
    }
}
