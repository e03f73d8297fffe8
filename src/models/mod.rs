//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod connection;
pub mod group;
pub mod message;
pub mod notification;

// Re-export commonly used models
pub use connection::{
    Connection, ConnectionRole, ConnectionStatus, CreateConnectionRequest, MentorKind,
    PaymentStatus,
};
pub use group::{
    CreateGroupRequest, Group, GroupKind, GroupParticipant, JoinRequest, JoinRequestStatus,
};
pub use message::{ConversationId, ConversationKind, Message, ReadPosition};
pub use notification::{CreateNotificationRequest, Notification};
