//! The presence API seam.
//!
//! The connection manager and the refresher only need four calls. They are
//! written against this trait so the real HTTP client can be swapped for a
//! scripted one in tests.

use async_trait::async_trait;

use kp_core::error::KpResult;
use kp_core::session::UserId;

use crate::client::ApiClient;
use crate::endpoints::auth::AuthIdentity;
use crate::endpoints::presence::{PresenceMode, PresenceSnapshot, SetPresenceOutcome};
use crate::endpoints::rtm::RtmConnectInfo;

/// Request/response presence operations.
///
/// Network failures surface as `KpError::Http`/`KpError::Timeout`, which are
/// distinct from application-level rejections.
#[async_trait]
pub trait PresenceApi: Send + Sync {
    /// Validate credentials and identify the user.
    async fn auth_test(&self) -> KpResult<AuthIdentity>;

    /// Obtain a streaming endpoint.
    async fn rtm_connect(&self, batch_presence_aware: bool) -> KpResult<RtmConnectInfo>;

    /// Fetch a fresh presence snapshot.
    async fn get_presence(&self, user: &UserId) -> KpResult<PresenceSnapshot>;

    /// Set presence. `ok: false` is returned, not raised.
    async fn set_presence(
        &self,
        mode: PresenceMode,
        set_active: bool,
    ) -> KpResult<SetPresenceOutcome>;
}

#[async_trait]
impl PresenceApi for ApiClient {
    async fn auth_test(&self) -> KpResult<AuthIdentity> {
        ApiClient::auth_test(self).await
    }

    async fn rtm_connect(&self, batch_presence_aware: bool) -> KpResult<RtmConnectInfo> {
        ApiClient::rtm_connect(self, batch_presence_aware).await
    }

    async fn get_presence(&self, user: &UserId) -> KpResult<PresenceSnapshot> {
        self.users_get_presence(user).await
    }

    async fn set_presence(
        &self,
        mode: PresenceMode,
        set_active: bool,
    ) -> KpResult<SetPresenceOutcome> {
        self.users_set_presence(mode, set_active).await
    }
}
