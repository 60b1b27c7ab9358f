//! Run command - keep presence active until interrupted.

use std::sync::Arc;

use tracing::{info, warn};

use kp_core::config::AppConfig;
use kp_core::constants;
use kp_core::error::{KpError, KpResult};
use kp_core::session::ShutdownSignal;
use kp_services::{install_signal_handlers, Supervisor};
use kp_socket::WsTransport;

/// Run the daemon. Returns once shutdown completes or a fatal error occurs.
///
/// A second signal while shutting down abandons the wait with
/// `KpError::ShuttingDown`.
pub async fn run(config: AppConfig) -> KpResult<()> {
    let api = Arc::new(super::create_api_client(&config)?);

    let shutdown = ShutdownSignal::new();
    let force = install_signal_handlers(shutdown.clone())?;

    info!("{} v{} starting", constants::APP_NAME, constants::APP_VERSION);
    let supervisor = Supervisor::new(api, WsTransport::default(), config, shutdown);

    tokio::select! {
        result = supervisor.run() => result,
        _ = force.wait() => {
            warn!("shutdown interrupted, exiting immediately");
            Err(KpError::ShuttingDown)
        }
    }
}
