#![deny(unsafe_code)]

//! Configuration loading and validation for livelink.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure: where to send OSC messages, where to
//! listen for replies, and how long to wait for them.
//!
//! ## TOML Example
//!
//! ```toml
//! [remote]
//! host = "127.0.0.1"
//! port = 9000
//!
//! [listener]
//! host = "127.0.0.1"
//! port = 9001
//!
//! [query]
//! timeout_ms = 5000
//! beat_address = "/live/beat"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where outbound messages are sent (the Live remote script).
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local socket that receives replies and notifications.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Request/response behaviour.
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Destination of outbound OSC messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Host name or IP address of the remote application.
    #[serde(default = "default_remote_host")]
    pub host: String,

    /// UDP port the remote application listens on.
    #[serde(default = "default_remote_port")]
    pub port: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: default_remote_host(),
            port: default_remote_port(),
        }
    }
}

fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}

fn default_remote_port() -> u16 {
    9000
}

/// Local listener for inbound OSC messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Address to bind the listener to.
    #[serde(default = "default_listener_host")]
    pub host: String,

    /// UDP port to bind. `0` picks an ephemeral port.
    #[serde(default = "default_listener_port")]
    pub port: u16,

    /// Consecutive receive failures tolerated before the receive loop stops.
    #[serde(default = "default_max_receive_errors")]
    pub max_receive_errors: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_listener_host(),
            port: default_listener_port(),
            max_receive_errors: default_max_receive_errors(),
        }
    }
}

fn default_listener_host() -> String {
    "127.0.0.1".to_string()
}

fn default_listener_port() -> u16 {
    9001
}

fn default_max_receive_errors() -> u32 {
    8
}

/// Request/response settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// How long a request waits for its response, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Address of the periodic tick notification.
    #[serde(default = "default_beat_address")]
    pub beat_address: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            beat_address: default_beat_address(),
        }
    }
}

impl QueryConfig {
    /// The request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_beat_address() -> String {
    "/live/beat".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.host.is_empty() {
            return Err(ConfigError::Validation(
                "remote.host must not be empty".to_string(),
            ));
        }
        if self.remote.port == 0 {
            return Err(ConfigError::Validation(
                "remote.port must be non-zero".to_string(),
            ));
        }
        if self.listener.host.is_empty() {
            return Err(ConfigError::Validation(
                "listener.host must not be empty".to_string(),
            ));
        }
        if self.listener.max_receive_errors == 0 {
            return Err(ConfigError::Validation(
                "listener.max_receive_errors must be at least 1".to_string(),
            ));
        }
        if self.query.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "query.timeout_ms must be non-zero".to_string(),
            ));
        }
        if !self.query.beat_address.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "query.beat_address must start with '/', got {:?}",
                self.query.beat_address
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
