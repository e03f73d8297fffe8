//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use url::Url;

use super::Settings;
use crate::utils::errors::{MentorLinkError, Result};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_payment_config(&settings.payment)?;
    validate_chat_config(&settings.chat)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(MentorLinkError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(MentorLinkError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(MentorLinkError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(MentorLinkError::Config(
            "Redis URL is required".to_string()
        ));
    }

    if config.ttl_seconds == 0 {
        return Err(MentorLinkError::Config(
            "Session TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate payment API configuration
fn validate_payment_config(config: &super::PaymentConfig) -> Result<()> {
    if let Some(ref verify_url) = config.verify_url {
        Url::parse(verify_url)
            .map_err(|e| MentorLinkError::Config(format!("Invalid payment verify URL: {}", e)))?;
    }

    if config.timeout_seconds == 0 {
        return Err(MentorLinkError::Config(
            "Payment timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate chat configuration
fn validate_chat_config(config: &super::ChatConfig) -> Result<()> {
    if config.backlog_limit <= 0 {
        return Err(MentorLinkError::Config(
            "Backlog limit must be greater than 0".to_string()
        ));
    }

    if config.broadcast_capacity == 0 {
        return Err(MentorLinkError::Config(
            "Broadcast capacity must be greater than 0".to_string()
        ));
    }

    if config.sends_per_minute == 0 {
        return Err(MentorLinkError::Config(
            "Send quota must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(MentorLinkError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(MentorLinkError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_rejects_bad_payment_url() {
        let mut settings = Settings::default();
        settings.payment.verify_url = Some("not a url".to_string());
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_bad_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut settings = Settings::default();
        settings.chat.broadcast_capacity = 0;
        assert!(validate_settings(&settings).is_err());
    }
}
