//! Database module
//!
//! This module handles database connections and storage backends

pub mod connection;
pub mod memory;
pub mod repositories;
pub mod storage;

// Re-export commonly used database components
pub use connection::{create_pool, health_check, run_migrations, DatabasePool, PoolOptions};
pub use memory::MemoryStore;
pub use repositories::{
    ApproveOutcome, ConnectionRepository, GroupRepository, JoinRequestOutcome, MessageRepository,
    NotificationRepository, RosterChange,
};
pub use storage::Storage;
