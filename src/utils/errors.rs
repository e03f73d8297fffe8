//! Error handling for MentorLink
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the MentorLink core
#[derive(Error, Debug)]
pub enum MentorLinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Group {group_id} is full ({max_participants} participants)")]
    GroupFull { group_id: Uuid, max_participants: i32 },

    #[error("User {user_id} is already a participant of group {group_id}")]
    AlreadyMember { group_id: Uuid, user_id: String },

    #[error("User {user_id} already has a pending join request for group {group_id}")]
    DuplicateJoinRequest { group_id: Uuid, user_id: String },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: Uuid },

    #[error("Group not found: {group_id}")]
    GroupNotFound { group_id: Uuid },

    #[error("Notification not found: {notification_id}")]
    NotificationNotFound { notification_id: Uuid },

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Subscription lagged, {skipped} messages skipped")]
    SubscriptionLagged { skipped: u64 },

    #[error("Chat session is closed")]
    SessionClosed,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Payment verification rejected reference: {0}")]
    PaymentRejected(String),
}

/// Result type alias for MentorLink operations
pub type Result<T> = std::result::Result<T, MentorLinkError>;

impl MentorLinkError {
    /// Check if the error is recoverable by retrying the operation
    pub fn is_recoverable(&self) -> bool {
        match self {
            MentorLinkError::Database(_) => false,
            MentorLinkError::Migration(_) => false,
            MentorLinkError::Redis(_) => true,
            MentorLinkError::Http(_) => true,
            MentorLinkError::Serialization(_) => false,
            MentorLinkError::Io(_) => true,
            MentorLinkError::UrlParse(_) => false,
            MentorLinkError::Config(_) => false,
            MentorLinkError::InvalidInput(_) => false,
            MentorLinkError::PermissionDenied(_) => false,
            MentorLinkError::InvalidTransition { .. } => false,
            MentorLinkError::GroupFull { .. } => false,
            MentorLinkError::AlreadyMember { .. } => false,
            MentorLinkError::DuplicateJoinRequest { .. } => false,
            MentorLinkError::ConnectionNotFound { .. } => false,
            MentorLinkError::GroupNotFound { .. } => false,
            MentorLinkError::NotificationNotFound { .. } => false,
            MentorLinkError::SendFailed(_) => true,
            MentorLinkError::SubscriptionLagged { .. } => true,
            MentorLinkError::SessionClosed => false,
            MentorLinkError::RateLimitExceeded => true,
            MentorLinkError::PaymentRejected(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MentorLinkError::Database(_) => ErrorSeverity::Critical,
            MentorLinkError::Migration(_) => ErrorSeverity::Critical,
            MentorLinkError::Config(_) => ErrorSeverity::Critical,
            MentorLinkError::PermissionDenied(_) => ErrorSeverity::Warning,
            MentorLinkError::RateLimitExceeded => ErrorSeverity::Warning,
            MentorLinkError::SubscriptionLagged { .. } => ErrorSeverity::Warning,
            MentorLinkError::InvalidInput(_) => ErrorSeverity::Info,
            MentorLinkError::AlreadyMember { .. } => ErrorSeverity::Info,
            MentorLinkError::DuplicateJoinRequest { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
