//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "keep-presence";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the Slack API token.
pub const TOKEN_ENV_VAR: &str = "SLACK_TOKEN";

/// Base URL of the Slack Web API.
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Default API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Interval between forced presence refreshes, in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Grace period for a liveness probe pong, in seconds.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 2;

/// Transport-level keepalive ping interval, in seconds.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;

/// Delay before reconnecting after the stream closes, in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Maximum consecutive retries for authentication and connect.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Backoff base; attempt `n` sleeps `base^n` seconds.
pub const DEFAULT_RETRY_BASE_SECS: u64 = 2;

/// Payload carried by liveness probe pings.
pub const PROBE_PAYLOAD: &[u8] = b"detecting presence";

/// Payload carried by transport keepalive pings.
pub const KEEPALIVE_PAYLOAD: &[u8] = b"keepalive";

/// RTM event types and presence values consumed by the connection manager.
pub mod rtm {
    pub const PRESENCE_CHANGE: &str = "presence_change";
    pub const PRESENCE_SUB: &str = "presence_sub";
    pub const AWAY: &str = "away";
}
