//! Presence endpoints.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use kp_core::error::KpResult;
use kp_core::session::UserId;

use crate::client::ApiClient;

/// Presence as reported by `users.getPresence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Active,
    Away,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Away => write!(f, "away"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A user's presence at the time of the call.
///
/// Snapshots are never cached; every fetch is a fresh round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub presence: Presence,
    /// Set when the user explicitly marked themselves away.
    #[serde(default)]
    pub manual_away: bool,
    /// Unix timestamp of the last activity. Only reported for the token's own user.
    #[serde(default)]
    pub last_activity: Option<i64>,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub auto_away: Option<bool>,
    #[serde(default)]
    pub connection_count: Option<u32>,
}

impl PresenceSnapshot {
    /// Absolute time of the last activity.
    pub fn last_activity_time(&self) -> Option<DateTime<Utc>> {
        self.last_activity
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    /// Minutes elapsed between the last activity and `now`.
    pub fn minutes_since_activity(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_activity_time()
            .map(|at| (now - at).num_seconds() as f64 / 60.0)
    }
}

/// Presence mode accepted by `users.setPresence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceMode {
    /// Let Slack derive presence from activity.
    Auto,
}

impl PresenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
        }
    }
}

/// Result of `users.setPresence`. An `ok: false` here is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPresenceOutcome {
    pub ok: bool,
    pub error: Option<String>,
}

impl ApiClient {
    /// Fetch a user's current presence.
    pub async fn users_get_presence(&self, user: &UserId) -> KpResult<PresenceSnapshot> {
        let resp = self
            .call("users.getPresence", &[("user", user.as_str().to_string())])
            .await?;
        resp.into_data("users.getPresence")
    }

    /// Set the token user's presence, optionally marking them active.
    pub async fn users_set_presence(
        &self,
        mode: PresenceMode,
        set_active: bool,
    ) -> KpResult<SetPresenceOutcome> {
        let resp = self
            .call(
                "users.setPresence",
                &[
                    ("presence", mode.as_str().to_string()),
                    ("set_active", set_active.to_string()),
                ],
            )
            .await?;
        Ok(SetPresenceOutcome {
            ok: resp.ok,
            error: resp.error,
        })
    }
}
