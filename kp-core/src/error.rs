//! Global error types for keep-presence.
//!
//! All error categories across the workspace are unified into a single
//! `KpError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using KpError.
pub type KpResult<T> = Result<T, KpError>;

/// Unified error type covering all error categories in keep-presence.
#[derive(Error, Debug)]
pub enum KpError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// HTTP request failed at the network layer.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Streaming connection could not be opened or written to.
    #[error("socket error: {0}")]
    Socket(String),

    // -- Application errors --
    /// The API answered with `ok: false`.
    #[error("{method} failed: {error}")]
    Api {
        /// API method name (e.g. "users.getPresence").
        method: String,
        /// Error code reported by the API.
        error: String,
    },

    /// Authentication was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// An operation kept failing until the retry budget ran out.
    #[error("{operation} failed after {attempts} retries: {last_error}")]
    RetriesExhausted {
        /// Operation that was being retried.
        operation: &'static str,
        /// Number of retries performed.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// Shutdown was requested while the operation was in progress.
    #[error("shutdown in progress")]
    ShuttingDown,

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl KpError {
    /// Whether the error came from the network layer rather than the application.
    ///
    /// Only transient errors are retried when establishing a connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout(_) | Self::Socket(_))
    }

    /// Whether the error only reports that shutdown interrupted the operation.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }
}

impl From<serde_json::Error> for KpError {
    fn from(e: serde_json::Error) -> Self {
        KpError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for KpError {
    fn from(e: toml::de::Error) -> Self {
        KpError::Config(e.to_string())
    }
}
