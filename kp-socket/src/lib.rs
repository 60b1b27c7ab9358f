//! keep-presence Socket - RTM event streaming and connection lifecycle.
//!
//! This crate provides:
//! - Typed RTM events and the connection state machine states
//! - A transport abstraction with a tokio-tungstenite WebSocket implementation
//! - The connection manager: connect, event dispatch, liveness probes and
//!   reconnection with bounded exponential backoff

pub mod events;
pub mod manager;
pub mod transport;

// Re-export key types
pub use events::{ConnectionState, PresenceChange, RtmEvent};
pub use manager::{ConnectionManager, EventOutcome, ManagerConfig};
pub use transport::{
    ConnectionId, EventSender, OpenParams, Transport, TransportEvent, TransportEventKind,
    TransportHandle, WsTransport,
};
