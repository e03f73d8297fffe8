//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging
//! utilities for the MentorLink core.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration
///
/// The returned guard must stay alive for the file appender to flush.
pub fn init_logging(config: &LoggingConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "mentorlink.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log connection lifecycle transitions with structured data
pub fn log_connection_transition(connection_id: uuid::Uuid, from: &str, to: &str, actor_id: &str) {
    info!(
        connection_id = %connection_id,
        from = from,
        to = to,
        actor_id = actor_id,
        "Connection transition"
    );
}

/// Log group roster events
pub fn log_group_event(group_id: uuid::Uuid, event: &str, user_id: Option<&str>) {
    info!(
        group_id = %group_id,
        event = event,
        user_id = user_id,
        "Group event occurred"
    );
}

/// Log rejected store operations with context
pub fn log_denied_operation(operation: &str, actor_id: &str, reason: &str) {
    warn!(
        operation = operation,
        actor_id = actor_id,
        reason = reason,
        "Operation denied"
    );
}
