//! RTM event types and connection states.
//!
//! Only `presence_change` is interpreted; every other event type is kept as
//! its type tag so it can be traced and skipped.

use serde::{Deserialize, Serialize};

use kp_core::constants::rtm;
use kp_core::error::{KpError, KpResult};
use kp_core::session::UserId;

/// An inbound RTM event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtmEvent {
    /// A presence change for one user, or a batch of users.
    PresenceChange(PresenceChange),
    /// Any other event type (`hello`, `reconnect_url`, ...).
    Other(String),
}

impl RtmEvent {
    /// Parse a raw text frame.
    pub fn parse(raw: &str) -> KpResult<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let event_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| KpError::Serialization("rtm event without a type".into()))?;

        if event_type == rtm::PRESENCE_CHANGE {
            let change: PresenceChange = serde_json::from_value(value)?;
            Ok(Self::PresenceChange(change))
        } else {
            Ok(Self::Other(event_type.to_string()))
        }
    }
}

/// Payload of a `presence_change` event.
///
/// Batch-presence-aware connections deliver `users`; others deliver `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceChange {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub users: Vec<String>,
    pub presence: String,
}

impl PresenceChange {
    /// Whether the event reports on `user`.
    pub fn concerns(&self, user: &UserId) -> bool {
        self.user.as_deref() == Some(user.as_str())
            || self.users.iter().any(|u| u == user.as_str())
    }

    pub fn is_away(&self) -> bool {
        self.presence == rtm::AWAY
    }
}

/// Subscription frame declaring interest in presence events for `user`.
pub fn presence_subscription(user: &UserId) -> String {
    serde_json::json!({
        "type": rtm::PRESENCE_SUB,
        "ids": [user.as_str()],
    })
    .to_string()
}

/// Connection state for the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection.
    Disconnected,
    /// Endpoint requested or transport handshake in progress.
    Connecting,
    /// Transport open and subscribed.
    Connected,
    /// Connection closing, locally or by the peer.
    Closing,
    /// Connection failed with a transport error.
    Erroring,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closing => write!(f, "closing"),
            Self::Erroring => write!(f, "erroring"),
        }
    }
}
