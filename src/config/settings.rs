//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub payment: PaymentConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration for session storage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Payment verification API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
    /// Verification endpoint; when unset, payment references are trusted
    pub verify_url: Option<String>,
    pub timeout_seconds: u64,
}

/// Chat behaviour configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Maximum messages loaded per backlog fetch
    pub backlog_limit: i64,
    /// Capacity of each conversation's broadcast channel
    pub broadcast_capacity: usize,
    /// Per-sender message quota per minute
    pub sends_per_minute: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    pub max_file_size: String,
    pub max_files: u32,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("MENTORLINK"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::MentorLinkError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/mentorlink".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "mentorlink:".to_string(),
                ttl_seconds: 3600,
            },
            payment: PaymentConfig {
                verify_url: None,
                timeout_seconds: 5,
            },
            chat: ChatConfig {
                backlog_limit: 200,
                broadcast_capacity: 256,
                sends_per_minute: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "/var/log/mentorlink".to_string(),
                max_file_size: "10MB".to_string(),
                max_files: 5,
            },
        }
    }
}
