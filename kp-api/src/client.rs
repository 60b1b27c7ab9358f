//! HTTP client for the Slack Web API.
//!
//! Handles bearer authentication, timeouts, status checks and error
//! classification. Retrying is left to the caller's backoff policy so that
//! delays are not compounded.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use kp_core::config::SlackConfig;
use kp_core::error::{KpError, KpResult};

use crate::response::SlackResponse;

/// HTTP client for Slack Web API methods.
///
/// Wraps reqwest::Client with token injection, form encoding and
/// error classification.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for API methods (e.g. "https://slack.com/api").
    api_root: String,
    /// Bearer token sent with every call.
    token: String,
}

impl ApiClient {
    /// Create a new ApiClient from Slack configuration.
    pub fn new(config: &SlackConfig) -> KpResult<Self> {
        let inner = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_secs(15))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                kp_core::constants::APP_NAME,
                kp_core::constants::APP_VERSION
            ))
            .build()
            .map_err(|e| KpError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            api_root: config.api_url.trim().trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Get the API root URL.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Full URL of a Web API method.
    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_root)
    }

    /// Call a Web API method with form-encoded arguments.
    ///
    /// Returns the envelope even when `ok` is false; network failures and
    /// non-2xx statuses become errors.
    pub async fn call(&self, method: &str, params: &[(&str, String)]) -> KpResult<SlackResponse> {
        debug!("POST {method}");

        let response = self
            .inner
            .post(self.method_url(method))
            .bearer_auth(&self.token)
            .form(params)
            .send()
            .await
            .map_err(Self::classify_error)?;

        let response = Self::check_status(response).await?;
        response
            .json::<SlackResponse>()
            .await
            .map_err(|e| KpError::Serialization(format!("failed to parse {method} response: {e}")))
    }

    /// Check the HTTP status code and convert to KpError if needed.
    async fn check_status(response: Response) -> KpResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(KpError::AuthFailed(format!("server returned {status}")));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            return Err(KpError::Http(format!("rate limited (retry after {retry_after}s)")));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KpError::Http(format!("server returned {status}: {body}")));
        }

        Ok(response)
    }

    /// Classify a reqwest error into a KpError variant.
    fn classify_error(e: reqwest::Error) -> KpError {
        if e.is_timeout() {
            KpError::Timeout(e.to_string())
        } else if e.is_connect() {
            KpError::Http(format!("connection failed: {e}"))
        } else {
            KpError::Http(e.to_string())
        }
    }
}
