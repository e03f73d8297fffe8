//! MentorLink core
//!
//! Connection lifecycle, group membership and chat backbone for a mentoring
//! community platform. This library provides the stores for mentoring
//! connections, groups and join requests, an ordered append-only message log
//! with live subscriptions, the chat session state machine, and notification
//! records for lifecycle transitions.

pub mod config;
pub mod database;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{MentorLinkError, Result};

// Re-export main components for easy access
pub use database::Storage;
pub use services::ServiceFactory;
pub use session::{ChatSession, SessionEvent, SessionState, SessionStorage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
