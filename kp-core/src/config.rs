//! Application configuration management.
//!
//! Handles loading and validating the keep-presence configuration: Slack
//! credentials, timer intervals, retry policy and logging. Configuration is
//! read from TOML on disk; every field has a default so the file is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{KpError, KpResult};
use crate::retry::RetryPolicy;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Slack API settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Presence refresh and liveness probe settings.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Streaming connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Backoff policy for authentication and connect.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Slack API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Web API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API token. Usually supplied through the `SLACK_TOKEN` environment variable.
    #[serde(default)]
    pub token: String,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub request_timeout_ms: u64,
}

/// Presence refresher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds between forced presence refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Seconds to wait for a liveness probe pong.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

/// Streaming connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Transport keepalive ping interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// Seconds to wait before reconnecting after the stream closes.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failures tolerated before giving up.
    #[serde(default = "default_max_retries")]
    pub max_attempts: u32,

    /// Backoff base in seconds; retry `n` waits `base^n` seconds.
    #[serde(default = "default_retry_base")]
    pub base_delay_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json_output: bool,
}

fn default_api_url() -> String {
    constants::DEFAULT_API_URL.to_string()
}

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_refresh_interval() -> u64 {
    constants::DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_probe_timeout() -> u64 {
    constants::DEFAULT_PROBE_TIMEOUT_SECS
}

fn default_keepalive() -> u64 {
    constants::DEFAULT_KEEPALIVE_SECS
}

fn default_reconnect_delay() -> u64 {
    constants::DEFAULT_RECONNECT_DELAY_SECS
}

fn default_max_retries() -> u32 {
    constants::DEFAULT_MAX_RETRIES
}

fn default_retry_base() -> u64 {
    constants::DEFAULT_RETRY_BASE_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: String::new(),
            request_timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_retries(),
            base_delay_secs: default_retry_base(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_output: false,
        }
    }
}

impl PresenceConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl ConnectionConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl RetryConfig {
    /// Build the backoff policy described by this section.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default config file path, if it exists.
    pub fn load_default() -> KpResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> KpResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Get the default configuration file path.
    ///
    /// - Linux: `~/.config/keep-presence/config.toml`
    /// - macOS: `~/Library/Application Support/keep-presence/config.toml`
    pub fn default_config_path() -> KpResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| KpError::Config("could not determine config directory".into()))?;
        Ok(base.join(constants::APP_NAME).join("config.toml"))
    }

    /// Override the token when one was supplied outside the config file.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.slack.token = token.trim().to_string();
        }
        self
    }

    /// Check that the configuration can drive a session.
    pub fn validate(&self) -> KpResult<()> {
        if self.slack.token.is_empty() {
            return Err(KpError::MissingConfig(format!(
                "Slack token (set {} or slack.token)",
                constants::TOKEN_ENV_VAR
            )));
        }
        if self.slack.api_url.is_empty() {
            return Err(KpError::MissingConfig("slack.api_url".into()));
        }
        if self.presence.refresh_interval_secs == 0 {
            return Err(KpError::Config("presence.refresh_interval_secs must be > 0".into()));
        }
        if self.presence.probe_timeout_secs == 0 {
            return Err(KpError::Config("presence.probe_timeout_secs must be > 0".into()));
        }
        if self.connection.keepalive_secs == 0 {
            return Err(KpError::Config("connection.keepalive_secs must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(KpError::Config("retry.max_attempts must be > 0".into()));
        }
        Ok(())
    }
}
