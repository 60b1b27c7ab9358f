//! Real-time messaging endpoints.

use serde::{Deserialize, Serialize};

use kp_core::error::KpResult;

use crate::client::ApiClient;

/// Connection info returned by `rtm.connect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtmConnectInfo {
    /// Single-use WebSocket URL for the event stream.
    pub url: String,
    /// The connecting user, as seen by the RTM server.
    #[serde(rename = "self", default)]
    pub self_user: Option<RtmSelf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtmSelf {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ApiClient {
    /// Request a WebSocket URL for the RTM event stream.
    ///
    /// With `batch_presence_aware`, presence changes may arrive batched in a
    /// single event carrying a `users` array.
    pub async fn rtm_connect(&self, batch_presence_aware: bool) -> KpResult<RtmConnectInfo> {
        let flag = if batch_presence_aware { "1" } else { "0" };
        let resp = self
            .call("rtm.connect", &[("batch_presence_aware", flag.to_string())])
            .await?;
        resp.into_data("rtm.connect")
    }
}
