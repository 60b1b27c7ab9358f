//! Shared test utilities for integration tests.
//!
//! Provides a scripted presence API and an in-memory transport that records
//! everything the connection manager asks of it.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kp_api::{
    AuthIdentity, Presence, PresenceApi, PresenceMode, PresenceSnapshot, RtmConnectInfo,
    SetPresenceOutcome,
};
use kp_core::config::AppConfig;
use kp_core::error::{KpError, KpResult};
use kp_core::session::{Session, ShutdownSignal, UserId};
use kp_socket::{
    ConnectionId, EventSender, OpenParams, Transport, TransportEvent, TransportEventKind,
    TransportHandle,
};

/// The user every fake session belongs to.
pub const USER: &str = "U123";

pub fn user() -> UserId {
    UserId::new(USER)
}

pub fn create_test_session() -> Session {
    Session::new(user(), ShutdownSignal::new())
}

/// A config with a token so `validate()` passes; timings are the defaults.
pub fn create_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.slack.token = "xoxp-test".into();
    config
}

pub fn network_error() -> KpError {
    KpError::Http("connection refused".into())
}

pub fn snapshot(presence: Presence, manual_away: bool) -> PresenceSnapshot {
    PresenceSnapshot {
        presence,
        manual_away,
        last_activity: Some(1_700_000_000),
        online: Some(true),
        auto_away: Some(!manual_away && presence == Presence::Away),
        connection_count: Some(1),
    }
}

/// A `presence_change` frame for `user`.
pub fn presence_event(user: &str, presence: &str) -> String {
    serde_json::json!({
        "type": "presence_change",
        "user": user,
        "presence": presence,
    })
    .to_string()
}

// ---- Presence API ----

/// Scripted `PresenceApi`.
///
/// Each call pops the next scripted result; once a script is empty the call
/// succeeds with a default answer.
#[derive(Default)]
pub struct FakePresenceApi {
    auth_script: Mutex<VecDeque<KpResult<AuthIdentity>>>,
    connect_script: Mutex<VecDeque<KpResult<RtmConnectInfo>>>,
    presence_script: Mutex<VecDeque<KpResult<PresenceSnapshot>>>,
    default_presence: Mutex<Option<PresenceSnapshot>>,
    set_outcome: Mutex<Option<SetPresenceOutcome>>,
    set_calls: Mutex<Vec<(PresenceMode, bool)>>,
    auth_count: AtomicUsize,
    connect_count: AtomicUsize,
    presence_count: AtomicUsize,
}

impl FakePresenceApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_auth(&self, result: KpResult<AuthIdentity>) {
        self.auth_script.lock().unwrap().push_back(result);
    }

    pub fn push_connect(&self, result: KpResult<RtmConnectInfo>) {
        self.connect_script.lock().unwrap().push_back(result);
    }

    pub fn push_presence(&self, result: KpResult<PresenceSnapshot>) {
        self.presence_script.lock().unwrap().push_back(result);
    }

    /// Snapshot returned once the presence script is exhausted.
    pub fn set_default_presence(&self, snapshot: PresenceSnapshot) {
        *self.default_presence.lock().unwrap() = Some(snapshot);
    }

    pub fn set_presence_outcome(&self, outcome: SetPresenceOutcome) {
        *self.set_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_count.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn presence_calls(&self) -> usize {
        self.presence_count.load(Ordering::SeqCst)
    }

    pub fn set_presence_calls(&self) -> Vec<(PresenceMode, bool)> {
        self.set_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PresenceApi for FakePresenceApi {
    async fn auth_test(&self) -> KpResult<AuthIdentity> {
        self.auth_count.fetch_add(1, Ordering::SeqCst);
        self.auth_script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(AuthIdentity {
                user_id: USER.into(),
                user: Some("tester".into()),
                team: Some("Test Team".into()),
                team_id: Some("T1".into()),
                url: None,
            })
        })
    }

    async fn rtm_connect(&self, batch_presence_aware: bool) -> KpResult<RtmConnectInfo> {
        assert!(batch_presence_aware, "connect must request batch presence");
        let n = self.connect_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.connect_script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(RtmConnectInfo {
                url: format!("wss://rtm.test/{n}"),
                self_user: None,
            })
        })
    }

    async fn get_presence(&self, user: &UserId) -> KpResult<PresenceSnapshot> {
        assert_eq!(user.as_str(), USER);
        self.presence_count.fetch_add(1, Ordering::SeqCst);
        self.presence_script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(self
                .default_presence
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| snapshot(Presence::Active, false)))
        })
    }

    async fn set_presence(
        &self,
        mode: PresenceMode,
        set_active: bool,
    ) -> KpResult<SetPresenceOutcome> {
        self.set_calls.lock().unwrap().push((mode, set_active));
        Ok(self
            .set_outcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(SetPresenceOutcome {
                ok: true,
                error: None,
            }))
    }
}

/// Wraps a [`FakePresenceApi`] and stalls every presence lookup.
pub struct SlowPresenceApi {
    inner: Arc<FakePresenceApi>,
    delay: Duration,
}

impl SlowPresenceApi {
    pub fn new(inner: Arc<FakePresenceApi>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay })
    }
}

#[async_trait]
impl PresenceApi for SlowPresenceApi {
    async fn auth_test(&self) -> KpResult<AuthIdentity> {
        self.inner.auth_test().await
    }

    async fn rtm_connect(&self, batch_presence_aware: bool) -> KpResult<RtmConnectInfo> {
        self.inner.rtm_connect(batch_presence_aware).await
    }

    async fn get_presence(&self, user: &UserId) -> KpResult<PresenceSnapshot> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_presence(user).await
    }

    async fn set_presence(
        &self,
        mode: PresenceMode,
        set_active: bool,
    ) -> KpResult<SetPresenceOutcome> {
        self.inner.set_presence(mode, set_active).await
    }
}

// ---- Transport ----

#[derive(Default)]
struct TransportLog {
    opened: Vec<(ConnectionId, String)>,
    closed: Vec<ConnectionId>,
    sent: Vec<(ConnectionId, String)>,
    pings: Vec<(ConnectionId, Vec<u8>)>,
    senders: HashMap<ConnectionId, EventSender>,
    open_failures: VecDeque<KpError>,
    auto_pong: bool,
}

/// In-memory transport.
///
/// Like the WebSocket transport, a successful `open` queues an `Opened`
/// event. Clones share the same log.
#[derive(Clone, Default)]
pub struct FakeTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every ping with a matching pong.
    pub fn with_auto_pong(self) -> Self {
        self.log.lock().unwrap().auto_pong = true;
        self
    }

    pub fn fail_next_open(&self, error: KpError) {
        self.log.lock().unwrap().open_failures.push_back(error);
    }

    pub fn opened(&self) -> Vec<ConnectionId> {
        self.log.lock().unwrap().opened.iter().map(|(id, _)| *id).collect()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.log.lock().unwrap().opened.iter().map(|(_, url)| url.clone()).collect()
    }

    pub fn closed(&self) -> Vec<ConnectionId> {
        self.log.lock().unwrap().closed.clone()
    }

    pub fn sent(&self) -> Vec<(ConnectionId, String)> {
        self.log.lock().unwrap().sent.clone()
    }

    pub fn pings(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.log.lock().unwrap().pings.clone()
    }

    pub fn last_opened(&self) -> Option<ConnectionId> {
        self.opened().last().copied()
    }

    /// Deliver an event as if connection `id` produced it.
    pub fn emit(&self, id: ConnectionId, kind: TransportEventKind) {
        let log = self.log.lock().unwrap();
        let sender = log.senders.get(&id).expect("connection was never opened");
        sender
            .send(TransportEvent {
                connection: id,
                kind,
            })
            .expect("event channel closed");
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Handle = FakeHandle;

    async fn open(&self, params: OpenParams, events: EventSender) -> KpResult<FakeHandle> {
        let mut log = self.log.lock().unwrap();
        if let Some(error) = log.open_failures.pop_front() {
            return Err(error);
        }

        log.opened.push((params.id, params.url));
        let _ = events.send(TransportEvent {
            connection: params.id,
            kind: TransportEventKind::Opened,
        });
        log.senders.insert(params.id, events.clone());

        Ok(FakeHandle {
            id: params.id,
            log: self.log.clone(),
            events,
            closed: false,
        })
    }
}

pub struct FakeHandle {
    id: ConnectionId,
    log: Arc<Mutex<TransportLog>>,
    events: EventSender,
    closed: bool,
}

impl TransportHandle for FakeHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: String) -> KpResult<()> {
        self.log.lock().unwrap().sent.push((self.id, payload));
        Ok(())
    }

    fn ping(&self, payload: Vec<u8>) -> KpResult<()> {
        let mut log = self.log.lock().unwrap();
        log.pings.push((self.id, payload.clone()));
        if log.auto_pong {
            let _ = self.events.send(TransportEvent {
                connection: self.id,
                kind: TransportEventKind::Pong(payload),
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().closed.push(self.id);
        }
    }
}
