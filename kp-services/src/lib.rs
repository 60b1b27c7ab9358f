//! keep-presence Services - Presence refresh and process lifecycle.
//!
//! This crate provides:
//! - The presence refresher (periodic active-set routine)
//! - The lifecycle supervisor: authentication with backoff, the event loop
//!   that owns the connection manager, liveness probes and signal shutdown

pub mod refresher;
pub mod supervisor;

// Re-export key types
pub use refresher::{PresenceRefresher, RefreshOutcome};
pub use supervisor::{install_signal_handlers, Supervisor};
