//! Authentication endpoints.

use serde::{Deserialize, Serialize};

use kp_core::error::{KpError, KpResult};

use crate::client::ApiClient;

/// Identity returned by `auth.test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIdentity {
    /// Authenticated user's id.
    pub user_id: String,
    /// Authenticated user's name.
    #[serde(default)]
    pub user: Option<String>,
    /// Workspace name.
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    /// Workspace URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl ApiClient {
    /// Check the token and identify its user.
    ///
    /// An `ok: false` answer is reported as [`KpError::AuthFailed`].
    pub async fn auth_test(&self) -> KpResult<AuthIdentity> {
        let resp = self.call("auth.test", &[]).await?;
        if !resp.ok {
            return Err(KpError::AuthFailed(resp.error_code().to_string()));
        }
        resp.into_data("auth.test")
    }
}
