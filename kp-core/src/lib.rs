//! keep-presence Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other keep-presence crates:
//! - Application configuration (Slack token, timer intervals, retry policy)
//! - Global error type covering every failure category
//! - Structured logging with tracing
//! - The process-wide session and shutdown signal
//! - The exponential backoff policy shared by authentication and connect

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod retry;
pub mod session;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{KpError, KpResult};
pub use logging::init_logging;
pub use retry::{Backoff, RetryPolicy};
pub use session::{Session, ShutdownSignal, UserId};
