//! Web API response envelope.
//!
//! Every Slack Web API response is a JSON object with an `ok` flag. Failed
//! calls carry an `error` code; the remaining fields depend on the method:
//! ```json
//! { "ok": true, "presence": "active", "manual_away": false }
//! { "ok": false, "error": "invalid_auth" }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use kp_core::error::{KpError, KpResult};

/// Standard Web API response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackResponse {
    /// Whether the call succeeded at the application level.
    pub ok: bool,
    /// Error code (present only when `ok` is false).
    #[serde(default)]
    pub error: Option<String>,
    /// Non-fatal warning code.
    #[serde(default)]
    pub warning: Option<String>,
    /// Method-specific fields.
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl SlackResponse {
    /// Error code, or "unknown_error" if the server did not send one.
    pub fn error_code(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown_error")
    }

    /// Turn an `ok: false` envelope into [`KpError::Api`].
    pub fn into_result(self, method: &str) -> KpResult<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(KpError::Api {
                method: method.to_string(),
                error: self.error_code().to_string(),
            })
        }
    }

    /// Check `ok` and deserialize the method-specific fields.
    pub fn into_data<T: DeserializeOwned>(self, method: &str) -> KpResult<T> {
        let response = self.into_result(method)?;
        serde_json::from_value(serde_json::Value::Object(response.body))
            .map_err(|e| KpError::Serialization(format!("{method}: {e}")))
    }
}
