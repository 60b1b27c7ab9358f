//! Presence refresher.
//!
//! Periodically reasserts that the session user is active, unless they
//! chose to be away.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use kp_api::{PresenceApi, PresenceMode, PresenceSnapshot};
use kp_core::error::KpResult;
use kp_core::session::UserId;

/// What one active-set pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The user is manually away; presence was left alone.
    SkippedManualAway,
    /// set-presence was accepted.
    Refreshed,
    /// set-presence answered `ok: false`.
    Rejected,
}

/// Sets the session user's presence back to active.
pub struct PresenceRefresher<A> {
    api: Arc<A>,
    user: UserId,
}

impl<A: PresenceApi> PresenceRefresher<A> {
    pub fn new(api: Arc<A>, user: UserId) -> Self {
        Self { api, user }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Run the active-set routine once.
    ///
    /// Steps:
    /// 1. Fetch the presence snapshot and log the time since last activity
    /// 2. Skip when the user is manually away
    /// 3. Set presence to `auto` with `set_active`
    /// 4. Fetch again and log the result
    ///
    /// A rejected set-presence is logged, not returned. Network failures are
    /// returned so the caller decides how loud to be.
    pub async fn assert_active(&self) -> KpResult<RefreshOutcome> {
        let before = self.api.get_presence(&self.user).await?;
        log_snapshot("current", &before);

        if before.manual_away {
            info!("{} marked as manual away, not refreshing", self.user);
            return Ok(RefreshOutcome::SkippedManualAway);
        }

        let outcome = self.api.set_presence(PresenceMode::Auto, true).await?;
        let result = if outcome.ok {
            info!("presence for {} set to {}", self.user, PresenceMode::Auto.as_str());
            RefreshOutcome::Refreshed
        } else {
            error!(
                "users.setPresence rejected: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            RefreshOutcome::Rejected
        };

        let after = self.api.get_presence(&self.user).await?;
        log_snapshot("after refresh", &after);

        Ok(result)
    }
}

fn log_snapshot(label: &str, snapshot: &PresenceSnapshot) {
    let last_activity = snapshot
        .last_activity_time()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".into());
    let idle = snapshot
        .minutes_since_activity(Utc::now())
        .map(|m| format!("{m:.1}"))
        .unwrap_or_else(|| "?".into());

    info!(
        "{label} presence: {} (last activity {last_activity}, {idle} minutes ago)",
        snapshot.presence
    );
    debug!("{label} snapshot: {snapshot:?}");
}
