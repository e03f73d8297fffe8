//! Session storage implementation
//!
//! This module persists chat session contexts in Redis, including
//! serialization, expiration, and cleanup of stale sessions.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, error, info, warn};

use super::context::ChatSessionContext;
use crate::config::RedisConfig;
use crate::models::ConversationId;
use crate::utils::errors::Result;

/// Redis-based session storage
#[derive(Clone)]
pub struct SessionStorage {
    connection_manager: redis::aio::ConnectionManager,
    config: RedisConfig,
}

impl SessionStorage {
    /// Create a new session storage instance
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            config,
        })
    }

    /// Save a session context with TTL
    pub async fn save_context(&self, context: &ChatSessionContext) -> Result<()> {
        let key = self.context_key(&context.user_id, context.conversation);
        debug!(user_id = %context.user_id, key = %key, cursor = context.cursor,
               "Saving session context");

        let serialized = serde_json::to_string(context)?;
        let mut conn = self.connection_manager.clone();

        let ttl_seconds = match context.expires_at {
            Some(expires_at) => {
                let remaining = (expires_at - chrono::Utc::now()).num_seconds();
                remaining.max(60) as u64
            }
            None => self.config.ttl_seconds,
        };

        conn.set_ex::<_, _, ()>(&key, serialized, ttl_seconds).await?;
        Ok(())
    }

    /// Load a session context, dropping it when it expired
    pub async fn load_context(
        &self,
        user_id: &str,
        conversation: ConversationId,
    ) -> Result<Option<ChatSessionContext>> {
        let key = self.context_key(user_id, conversation);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = conn.get(&key).await?;
        let Some(data) = serialized else {
            debug!(user_id = %user_id, key = %key, "No session context found");
            return Ok(None);
        };

        let context: ChatSessionContext = match serde_json::from_str(&data) {
            Ok(context) => context,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to deserialize session context");
                return Err(e.into());
            }
        };

        if context.is_expired() {
            warn!(user_id = %user_id, expires_at = ?context.expires_at, "Session context expired, removing");
            self.delete_context(user_id, conversation).await?;
            return Ok(None);
        }

        debug!(user_id = %user_id, cursor = context.cursor, "Session context loaded");
        Ok(Some(context))
    }

    /// Delete a session context
    pub async fn delete_context(&self, user_id: &str, conversation: ConversationId) -> Result<()> {
        let key = self.context_key(user_id, conversation);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(&key).await?;
        if deleted > 0 {
            debug!(user_id = %user_id, "Deleted session context");
        }

        Ok(())
    }

    /// Check whether a context exists
    pub async fn context_exists(&self, user_id: &str, conversation: ConversationId) -> Result<bool> {
        let key = self.context_key(user_id, conversation);
        let mut conn = self.connection_manager.clone();

        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    /// All stored session context keys (for cleanup/monitoring)
    pub async fn active_session_keys(&self) -> Result<Vec<String>> {
        let pattern = format!("{}session:*", self.config.prefix);
        let mut conn = self.connection_manager.clone();

        let keys: Vec<String> = conn.keys(&pattern).await?;
        Ok(keys)
    }

    /// Remove contexts whose own expiry has passed
    pub async fn cleanup_expired_contexts(&self) -> Result<u32> {
        let keys = self.active_session_keys().await?;
        let mut conn = self.connection_manager.clone();
        let mut cleaned = 0;

        for key in keys {
            let serialized: Option<String> = conn.get(&key).await?;
            let Some(data) = serialized else { continue };
            match serde_json::from_str::<ChatSessionContext>(&data) {
                Ok(context) if context.is_expired() => {
                    let _: u32 = conn.del(&key).await?;
                    cleaned += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Removing unreadable session context");
                    let _: u32 = conn.del(&key).await?;
                    cleaned += 1;
                }
            }
        }

        if cleaned > 0 {
            info!(cleaned = cleaned, "Cleaned up expired session contexts");
        }

        Ok(cleaned)
    }

    /// Test Redis connection
    pub async fn test_connection(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn context_key(&self, user_id: &str, conversation: ConversationId) -> String {
        format!("{}session:{}:{}", self.config.prefix, user_id, conversation)
    }
}

impl std::fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Session storage with a periodic cleanup task
#[derive(Debug)]
pub struct SessionSweeper {
    storage: SessionStorage,
    interval: Duration,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl SessionSweeper {
    pub fn new(storage: SessionStorage, interval: Duration) -> Self {
        Self {
            storage,
            interval,
            handle: None,
        }
    }

    /// Start the periodic cleanup task
    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("Session sweeper is already running");
            return;
        }

        let storage = self.storage.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match storage.cleanup_expired_contexts().await {
                    Ok(count) => {
                        if count > 0 {
                            info!(count = count, "Session sweeper removed expired contexts");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Session sweeper run failed");
                    }
                }
            }
        });

        self.handle = Some(handle);
        info!(interval = ?self.interval, "Started session sweeper");
    }

    /// Stop the cleanup task
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Stopped session sweeper");
        }
    }
}

impl Drop for SessionSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
