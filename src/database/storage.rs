//! Storage aggregate
//!
//! Bundles one repository handle per store so services receive a single
//! value regardless of which backend is in use.

use std::sync::Arc;

use crate::database::connection::DatabasePool;
use crate::database::memory::MemoryStore;
use crate::database::repositories::{
    ConnectionRepository, GroupRepository, MessageRepository, NotificationRepository,
    PgConnectionRepository, PgGroupRepository, PgMessageRepository, PgNotificationRepository,
};

#[derive(Clone)]
pub struct Storage {
    pub connections: Arc<dyn ConnectionRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Storage {
    /// PostgreSQL-backed storage
    pub fn postgres(pool: DatabasePool) -> Self {
        Self {
            connections: Arc::new(PgConnectionRepository::new(pool.clone())),
            groups: Arc::new(PgGroupRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool)),
        }
    }

    /// In-memory storage for tests and embedded deployments
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            connections: store.clone(),
            groups: store.clone(),
            messages: store.clone(),
            notifications: store,
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}
