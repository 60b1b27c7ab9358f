//! Lifecycle supervisor.
//!
//! Authenticates, opens the first connection and then runs the single event
//! loop that owns the connection manager. The loop multiplexes:
//! - the shutdown signal
//! - transport events
//! - the presence refresh timer
//! - the liveness probe deadline

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use kp_api::{AuthIdentity, PresenceApi};
use kp_core::config::AppConfig;
use kp_core::error::{KpError, KpResult};
use kp_core::retry::Backoff;
use kp_core::session::{Session, ShutdownSignal, UserId};
use kp_socket::{ConnectionManager, EventOutcome, ManagerConfig, Transport, TransportEvent};

use crate::refresher::PresenceRefresher;

/// Owns the process lifecycle from authentication to clean exit.
pub struct Supervisor<A, T> {
    api: Arc<A>,
    transport: T,
    config: AppConfig,
    shutdown: ShutdownSignal,
}

impl<A, T> Supervisor<A, T>
where
    A: PresenceApi,
    T: Transport,
{
    pub fn new(api: Arc<A>, transport: T, config: AppConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            api,
            transport,
            config,
            shutdown,
        }
    }

    /// Handle used to request shutdown from outside the loop.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Validate the token, retrying every failure with backoff.
    pub async fn authenticate(&self) -> KpResult<AuthIdentity> {
        let mut backoff = Backoff::new("authentication", self.config.retry.policy());

        loop {
            if self.shutdown.is_triggered() {
                return Err(KpError::ShuttingDown);
            }

            match self.api.auth_test().await {
                Ok(identity) => {
                    info!(
                        "authenticated as {} ({}) on {}",
                        identity.user.as_deref().unwrap_or("unknown user"),
                        identity.user_id,
                        identity.team.as_deref().unwrap_or("unknown team")
                    );
                    return Ok(identity);
                }
                Err(e) => backoff.wait_after_failure(&e, &self.shutdown).await?,
            }
        }
    }

    /// Run until shutdown or a fatal error.
    ///
    /// Returns `Ok(())` for a clean shutdown. Any error returned is fatal
    /// and has already been logged.
    pub async fn run(self) -> KpResult<()> {
        let identity = match self.authenticate().await {
            Ok(identity) => identity,
            Err(e) if e.is_shutdown() => {
                info!("shutdown requested during authentication");
                return Ok(());
            }
            Err(e) => {
                error!("giving up on authentication: {e}");
                return Err(e);
            }
        };

        let session = Session::new(UserId::new(identity.user_id), self.shutdown.clone());
        let refresher = PresenceRefresher::new(self.api.clone(), session.user_id().clone());

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut manager = ConnectionManager::new(
            self.api.clone(),
            self.transport,
            session,
            ManagerConfig::from_app_config(&self.config),
            events_tx,
        );

        let period = self.config.presence.refresh_interval();
        let shutdown = self.shutdown;

        let result = match manager.connect().await {
            Ok(()) => {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                info!("refreshing presence every {}s", period.as_secs());

                loop {
                    let deadline = manager.probe_deadline();

                    let wake = tokio::select! {
                        biased;

                        _ = shutdown.wait() => break Ok(()),
                        Some(event) = events.recv() => Wake::Event(event),
                        _ = ticker.tick() => Wake::Refresh,
                        _ = probe_expiry(deadline) => Wake::ProbeExpired,
                    };

                    // Shutdown preempts the step at whatever call it is awaiting.
                    let step = tokio::select! {
                        biased;

                        _ = shutdown.wait() => break Ok(()),
                        step = run_step(&mut manager, &refresher, wake) => step,
                    };

                    match step {
                        Ok(()) => {}
                        Err(e) if e.is_shutdown() => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            }
            Err(e) if e.is_shutdown() => Ok(()),
            Err(e) => Err(e),
        };

        manager.shutdown();

        match &result {
            Ok(()) => info!("shut down cleanly"),
            Err(e) => error!("fatal: {e}"),
        }
        result
    }
}

/// What woke the event loop.
enum Wake {
    Event(TransportEvent),
    Refresh,
    ProbeExpired,
}

/// Handle one wake-up. Owns no state of its own, so dropping it mid-await is safe.
async fn run_step<A, T>(
    manager: &mut ConnectionManager<A, T>,
    refresher: &PresenceRefresher<A>,
    wake: Wake,
) -> KpResult<()>
where
    A: PresenceApi,
    T: Transport,
{
    match wake {
        Wake::Event(event) => match manager.handle_event(event).await? {
            EventOutcome::AwayDetected => {
                refresh(refresher).await;
                manager.reconnect().await
            }
            EventOutcome::Handled | EventOutcome::Ignored => Ok(()),
        },
        Wake::Refresh => {
            refresh(refresher).await;
            if !manager.start_probe() {
                debug!("no live connection to probe");
            }
            Ok(())
        }
        Wake::ProbeExpired => manager.on_probe_timeout().await,
    }
}

/// Run one refresh pass. Failures are logged and the loop carries on.
async fn refresh<A: PresenceApi>(refresher: &PresenceRefresher<A>) {
    if let Err(e) = refresher.assert_active().await {
        error!("presence refresh for {} failed: {e}", refresher.user());
    }
}

/// Resolve at the probe deadline, or never when no probe is armed.
async fn probe_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Trigger `shutdown` on SIGINT, and also on SIGTERM on unix.
///
/// The first signal requests a clean shutdown. A second one triggers the
/// returned signal so the binary can stop waiting and exit at once.
pub fn install_signal_handlers(shutdown: ShutdownSignal) -> KpResult<ShutdownSignal> {
    let mut signals = Signals::new()?;
    let force = ShutdownSignal::new();
    let forced = force.clone();

    tokio::spawn(async move {
        while let Some(name) = signals.next().await {
            if shutdown.trigger() {
                info!("received {name}, shutting down");
            } else {
                warn!("received {name} again, exiting without waiting");
                forced.trigger();
                return;
            }
        }
    });

    Ok(force)
}

/// Termination signals the process listens for.
struct Signals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl Signals {
    fn new() -> KpResult<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Wait for the next signal. `None` once listening is no longer possible.
    #[cfg(unix)]
    async fn next(&mut self) -> Option<&'static str> {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => Some("SIGINT"),
                Err(e) => {
                    warn!("failed to listen for SIGINT: {e}");
                    None
                }
            },
            received = self.sigterm.recv() => received.map(|()| "SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> Option<&'static str> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some("SIGINT"),
            Err(e) => {
                warn!("failed to listen for SIGINT: {e}");
                None
            }
        }
    }
}
