//! RTM connection manager.
//!
//! Owns the current transport connection and drives the connection state
//! machine:
//!
//! `Disconnected -> Connecting -> Connected -> (Closing | Erroring) -> Disconnected`
//!
//! The manager is owned by a single event loop. Transport events are fed to
//! [`ConnectionManager::handle_event`] in arrival order; events from any
//! connection other than the current one are dropped, as is everything once
//! shutdown has begun.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

use kp_api::PresenceApi;
use kp_core::config::AppConfig;
use kp_core::constants;
use kp_core::error::{KpError, KpResult};
use kp_core::retry::{Backoff, RetryPolicy};
use kp_core::session::Session;

use crate::events::{presence_subscription, ConnectionState, RtmEvent};
use crate::transport::{
    ConnectionId, EventSender, OpenParams, Transport, TransportEvent, TransportEventKind,
    TransportHandle,
};

/// Timing and retry settings for the connection manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Transport keepalive ping interval.
    pub keepalive: Duration,
    /// Pause before reconnecting after the stream closes.
    pub reconnect_delay: Duration,
    /// Grace period for a liveness probe pong.
    pub probe_timeout: Duration,
    /// Backoff applied to failed connect attempts.
    pub retry: RetryPolicy,
}

impl ManagerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            keepalive: config.connection.keepalive(),
            reconnect_delay: config.connection.reconnect_delay(),
            probe_timeout: config.presence.probe_timeout(),
            retry: config.retry.policy(),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// What the event loop should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event was consumed.
    Handled,
    /// The event did not apply (stale connection, other user, shutdown...).
    Ignored,
    /// The user went away without choosing to: reassert presence, then reconnect.
    AwayDetected,
}

/// An outstanding liveness probe.
#[derive(Debug, Clone, Copy)]
struct Probe {
    connection: ConnectionId,
    deadline: Instant,
}

/// RTM connection manager.
///
/// Handles:
/// - Connecting: endpoint lookup, transport open, backoff on network failures
/// - Subscribing to the session user's presence on open
/// - Detecting involuntary away transitions
/// - Reconnecting after close/error, unless shutdown is in progress
/// - Liveness probes with a cancelable deadline
pub struct ConnectionManager<A, T: Transport> {
    api: Arc<A>,
    transport: T,
    session: Session,
    config: ManagerConfig,
    /// Sender handed to every connection the manager opens.
    events: EventSender,
    /// The single live connection, if any.
    current: Option<T::Handle>,
    /// Last issued connection id.
    last_id: u64,
    /// Consecutive connect failures.
    backoff: Backoff,
    /// Pending liveness probe.
    probe: Option<Probe>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
}

impl<A, T> ConnectionManager<A, T>
where
    A: PresenceApi,
    T: Transport,
{
    /// Create a new ConnectionManager. No connection is opened yet.
    pub fn new(
        api: Arc<A>,
        transport: T,
        session: Session,
        config: ManagerConfig,
        events: EventSender,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let backoff = Backoff::new("connect", config.retry);

        Self {
            api,
            transport,
            session,
            config,
            events,
            current: None,
            last_id: 0,
            backoff,
            probe: None,
            state: ConnectionState::Disconnected,
            state_tx,
        }
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Id of the live connection, if there is one.
    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.current.as_ref().map(|handle| handle.id())
    }

    /// Consecutive connect failures since the last fresh start.
    pub fn connect_failures(&self) -> u32 {
        self.backoff.attempts()
    }

    /// Update the connection state and notify watchers.
    fn set_state(&mut self, new_state: ConnectionState) {
        if self.state != new_state {
            info!("connection state: {} -> {}", self.state, new_state);
            self.state = new_state;
            self.state_tx.send_replace(new_state);
        }
    }

    /// Establish a connection, starting the connect backoff from zero.
    ///
    /// Network-layer failures are retried with backoff; anything else, or
    /// exhausting the backoff, is returned.
    pub async fn connect(&mut self) -> KpResult<()> {
        self.backoff.reset();

        loop {
            match self.try_connect().await {
                Ok(()) => {
                    self.backoff.reset();
                    return Ok(());
                }
                Err(e) if e.is_transient() => {
                    self.set_state(ConnectionState::Disconnected);
                    self.backoff
                        .wait_after_failure(&e, self.session.shutdown())
                        .await?;
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Err(e);
                }
            }
        }
    }

    /// One connect attempt: endpoint lookup, then transport open.
    async fn try_connect(&mut self) -> KpResult<()> {
        if self.session.is_shutting_down() {
            return Err(KpError::ShuttingDown);
        }
        if let Some(mut stale) = self.current.take() {
            stale.close();
        }

        self.set_state(ConnectionState::Connecting);
        let endpoint = self.api.rtm_connect(true).await?;

        self.last_id += 1;
        let id = ConnectionId::new(self.last_id);
        debug!("opening {id}");

        let handle = self
            .transport
            .open(
                OpenParams {
                    id,
                    url: endpoint.url,
                    keepalive: self.config.keepalive,
                },
                self.events.clone(),
            )
            .await?;
        self.current = Some(handle);
        Ok(())
    }

    /// Tear down the current connection and connect again.
    ///
    /// The connect backoff restarts from zero.
    pub async fn reconnect(&mut self) -> KpResult<()> {
        self.close_current(ConnectionState::Closing);
        self.connect().await
    }

    /// Close the live connection for good. Call after setting the shutdown flag.
    pub fn shutdown(&mut self) {
        self.close_current(ConnectionState::Closing);
    }

    fn close_current(&mut self, via: ConnectionState) {
        self.probe = None;
        if let Some(mut handle) = self.current.take() {
            self.set_state(via);
            handle.close();
            debug!("closed {}", handle.id());
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Dispatch one transport event.
    pub async fn handle_event(&mut self, event: TransportEvent) -> KpResult<EventOutcome> {
        if self.session.is_shutting_down() {
            debug!("shutting down, ignoring {:?} from {}", event.kind, event.connection);
            return Ok(EventOutcome::Ignored);
        }
        if self.current_connection() != Some(event.connection) {
            debug!(
                "ignoring {:?} from superseded {}",
                event.kind, event.connection
            );
            return Ok(EventOutcome::Ignored);
        }

        match event.kind {
            TransportEventKind::Opened => {
                self.on_open().await;
                Ok(EventOutcome::Handled)
            }
            TransportEventKind::Message(raw) => self.on_message(&raw).await,
            TransportEventKind::Pong(payload) => {
                self.on_pong(event.connection, &payload);
                Ok(EventOutcome::Handled)
            }
            TransportEventKind::Closed(reason) => {
                let reason = reason.unwrap_or_else(|| "no reason".into());
                self.on_terminated(ConnectionState::Closing, &reason).await?;
                Ok(EventOutcome::Handled)
            }
            TransportEventKind::Errored(cause) => {
                self.on_terminated(ConnectionState::Erroring, &cause).await?;
                Ok(EventOutcome::Handled)
            }
        }
    }

    async fn on_open(&mut self) {
        self.set_state(ConnectionState::Connected);
        info!("connected to Slack real-time API");

        let user = self.session.user_id();
        if let Some(handle) = self.current.as_ref() {
            if let Err(e) = handle.send(presence_subscription(user)) {
                error!("failed to subscribe to presence for {user}: {e}");
            }
        }

        match self.api.get_presence(user).await {
            Ok(snapshot) => debug!("presence on connect: {snapshot:?}"),
            Err(e) => debug!("presence lookup on connect failed: {e}"),
        }
    }

    async fn on_message(&mut self, raw: &str) -> KpResult<EventOutcome> {
        let change = match RtmEvent::parse(raw) {
            Ok(RtmEvent::PresenceChange(change)) => change,
            Ok(RtmEvent::Other(event_type)) => {
                debug!("skipping {event_type} event");
                return Ok(EventOutcome::Ignored);
            }
            Err(e) => {
                debug!("unparseable frame ({e}): {raw}");
                return Ok(EventOutcome::Ignored);
            }
        };

        debug!("got event: {raw}");
        let user = self.session.user_id();
        if !change.concerns(user) || !change.is_away() {
            return Ok(EventOutcome::Ignored);
        }

        let snapshot = match self.api.get_presence(user).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("failed to fetch presence after away event: {e}");
                return Ok(EventOutcome::Ignored);
            }
        };
        debug!("away snapshot: {snapshot:?}");

        if snapshot.manual_away {
            info!("{user} marked as manual away, skipping");
            return Ok(EventOutcome::Ignored);
        }

        info!("presence changed to {}", change.presence);
        info!("marking {user} as active");
        Ok(EventOutcome::AwayDetected)
    }

    fn on_pong(&mut self, connection: ConnectionId, payload: &[u8]) {
        match self.probe {
            Some(probe)
                if probe.connection == connection && payload == constants::PROBE_PAYLOAD =>
            {
                debug!("liveness probe answered by {connection}");
                self.probe = None;
            }
            _ => debug!("keepalive pong from {connection}"),
        }
    }

    /// Handle the end of the current connection: wait, then connect afresh.
    async fn on_terminated(&mut self, via: ConnectionState, detail: &str) -> KpResult<()> {
        self.probe = None;
        self.current = None;
        self.set_state(via);
        self.set_state(ConnectionState::Disconnected);

        if self.session.is_shutting_down() {
            return Ok(());
        }

        debug!("connection to Slack real-time API terminated ({detail}), reconnecting");
        if !self.session.shutdown().sleep(self.config.reconnect_delay).await {
            return Err(KpError::ShuttingDown);
        }
        self.connect().await
    }

    /// Ping the live connection and arm the probe deadline.
    ///
    /// Returns false when there is no connection to probe.
    pub fn start_probe(&mut self) -> bool {
        let Some(handle) = self.current.as_ref() else {
            return false;
        };

        let connection = handle.id();
        if let Err(e) = handle.ping(constants::PROBE_PAYLOAD.to_vec()) {
            debug!("probe ping on {connection} not sent: {e}");
        }
        self.probe = Some(Probe {
            connection,
            deadline: Instant::now() + self.config.probe_timeout,
        });
        true
    }

    /// When the pending probe expires, if one is armed.
    pub fn probe_deadline(&self) -> Option<Instant> {
        self.probe.map(|probe| probe.deadline)
    }

    /// The probe went unanswered: treat the connection as dead.
    pub async fn on_probe_timeout(&mut self) -> KpResult<()> {
        let Some(probe) = self.probe.take() else {
            return Ok(());
        };
        if self.current_connection() != Some(probe.connection) {
            return Ok(());
        }

        info!("connection to Slack terminated, reconnecting...");
        self.reconnect().await
    }
}
