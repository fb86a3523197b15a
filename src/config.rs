//! Runtime configuration for the loan engine binary.
//!
//! Values come from environment variables, with an optional `.env` file
//! loaded first.

use crate::application::engine::EngineConfig;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),
}

pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 30;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Log filter directive (RUST_LOG)
    pub log_level: String,

    /// Upper bound for a single command, store and notifier included
    pub operation_timeout: Duration,

    /// Only proposed loans may be approved
    pub strict_approval: bool,

    /// Base URL of the notification service; notifications are only logged when unset
    pub notification_base_url: Option<String>,

    /// Bearer key for the notification service
    pub notification_api_key: Option<String>,

    /// Request timeout of the notification client, always below `operation_timeout`
    pub notification_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let operation_timeout = seconds(
            "LOAN_OPERATION_TIMEOUT_SECS",
            lookup("LOAN_OPERATION_TIMEOUT_SECS"),
            DEFAULT_OPERATION_TIMEOUT_SECS,
        )?;
        let notification_timeout = seconds(
            "NOTIFICATION_TIMEOUT_SECS",
            lookup("NOTIFICATION_TIMEOUT_SECS"),
            DEFAULT_NOTIFICATION_TIMEOUT_SECS,
        )?;
        if notification_timeout >= operation_timeout {
            return Err(ConfigError::InvalidValue(format!(
                "NOTIFICATION_TIMEOUT_SECS ({}) must be lower than LOAN_OPERATION_TIMEOUT_SECS ({})",
                notification_timeout.as_secs(),
                operation_timeout.as_secs()
            )));
        }

        let strict_approval = match lookup("LOAN_STRICT_APPROVAL") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "LOAN_STRICT_APPROVAL must be true or false, got '{}'",
                    raw
                ))
            })?,
            None => true,
        };

        let notification_base_url = lookup("NOTIFICATION_BASE_URL").filter(|url| !url.trim().is_empty());
        let notification_api_key = lookup("NOTIFICATION_API_KEY");

        if notification_base_url.is_some() && notification_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("NOTIFICATION_API_KEY".to_string()));
        }

        Ok(Config {
            log_level,
            operation_timeout,
            strict_approval,
            notification_base_url,
            notification_api_key,
            notification_timeout,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            strict_approval: self.strict_approval,
        }
    }
}

fn seconds(name: &str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "{} must be a positive number of seconds, got '{}'",
                name, raw
            ))
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
