//! CLI command implementations.

pub mod run;
pub mod status;

use kp_api::ApiClient;
use kp_core::config::AppConfig;
use kp_core::error::KpResult;

/// Helper to create an API client from a validated config.
pub fn create_api_client(config: &AppConfig) -> KpResult<ApiClient> {
    config.validate()?;
    ApiClient::new(&config.slack)
}
