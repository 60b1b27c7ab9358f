//! End-to-end tests for the lifecycle supervisor.
//!
//! Runs the full event loop on a paused clock: authentication backoff,
//! first connect, the refresh timer, liveness probes, away detection and
//! signal-style shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use common::{FakePresenceApi, FakeTransport, SlowPresenceApi, USER};
use kp_api::{Presence, PresenceMode};
use kp_core::constants::PROBE_PAYLOAD;
use kp_core::error::{KpError, KpResult};
use kp_core::session::ShutdownSignal;
use kp_services::Supervisor;
use kp_socket::{ConnectionId, TransportEventKind};

fn spawn_supervisor(
    api: &Arc<FakePresenceApi>,
    transport: &FakeTransport,
) -> (JoinHandle<KpResult<()>>, ShutdownSignal) {
    let shutdown = ShutdownSignal::new();
    let supervisor = Supervisor::new(
        api.clone(),
        transport.clone(),
        common::create_test_config(),
        shutdown.clone(),
    );
    (tokio::spawn(supervisor.run()), shutdown)
}

fn probe_pings(transport: &FakeTransport) -> usize {
    transport
        .pings()
        .iter()
        .filter(|(_, payload)| payload.as_slice() == PROBE_PAYLOAD)
        .count()
}

// ---- Authentication ----

#[tokio::test(start_paused = true)]
async fn authentication_failures_are_retried_until_success() {
    let api = FakePresenceApi::new();
    for _ in 0..5 {
        api.push_auth(Err(common::network_error()));
    }
    let transport = FakeTransport::new();
    let start = Instant::now();
    let (task, shutdown) = spawn_supervisor(&api, &transport);

    // 2 + 4 + 8 + 16 + 32 seconds of backoff.
    sleep(Duration::from_secs(61)).await;
    assert_eq!(api.auth_calls(), 5);
    assert!(transport.opened().is_empty());

    sleep(Duration::from_secs(2)).await;
    assert_eq!(api.auth_calls(), 6);
    assert_eq!(transport.opened(), vec![ConnectionId::new(1)]);
    assert!(start.elapsed() >= Duration::from_secs(62));

    shutdown.trigger();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn sixth_authentication_failure_is_fatal() {
    let api = FakePresenceApi::new();
    for _ in 0..6 {
        api.push_auth(Err(KpError::AuthFailed("invalid_auth".into())));
    }
    let transport = FakeTransport::new();
    let (task, _shutdown) = spawn_supervisor(&api, &transport);

    let err = task.await.unwrap().unwrap_err();

    assert!(matches!(
        err,
        KpError::RetriesExhausted {
            operation: "authentication",
            attempts: 5,
            ..
        }
    ));
    assert_eq!(api.auth_calls(), 6);
    assert!(transport.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_authentication_backoff_is_clean() {
    let api = FakePresenceApi::new();
    for _ in 0..6 {
        api.push_auth(Err(common::network_error()));
    }
    let transport = FakeTransport::new();
    let (task, shutdown) = spawn_supervisor(&api, &transport);

    sleep(Duration::from_secs(3)).await;
    shutdown.trigger();

    task.await.unwrap().unwrap();
    assert_eq!(api.auth_calls(), 2);
    assert!(transport.opened().is_empty());
}

// ---- Refresh timer and liveness probe ----

#[tokio::test(start_paused = true)]
async fn refresh_with_answered_probe_keeps_connection() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new().with_auto_pong();
    let (task, shutdown) = spawn_supervisor(&api, &transport);

    sleep(Duration::from_secs(299)).await;
    assert_eq!(transport.opened(), vec![ConnectionId::new(1)]);
    assert!(api.set_presence_calls().is_empty(), "first refresh is one period in");

    sleep(Duration::from_secs(11)).await;
    assert_eq!(api.set_presence_calls(), vec![(PresenceMode::Auto, true)]);
    assert_eq!(probe_pings(&transport), 1);
    assert_eq!(transport.opened().len(), 1, "answered probe must not reconnect");
    assert!(transport.closed().is_empty());

    shutdown.trigger();
    task.await.unwrap().unwrap();
    assert_eq!(transport.closed(), vec![ConnectionId::new(1)]);
}

#[tokio::test(start_paused = true)]
async fn unanswered_probe_reconnects_exactly_once() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new();
    let (task, shutdown) = spawn_supervisor(&api, &transport);

    sleep(Duration::from_secs(301)).await;
    assert_eq!(probe_pings(&transport), 1);
    assert_eq!(transport.opened().len(), 1);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.closed(), vec![ConnectionId::new(1)]);
    assert_eq!(
        transport.opened(),
        vec![ConnectionId::new(1), ConnectionId::new(2)]
    );

    shutdown.trigger();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_is_not_fatal() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new().with_auto_pong();
    let (task, shutdown) = spawn_supervisor(&api, &transport);

    // Let the open-time presence fetch consume the default first.
    sleep(Duration::from_secs(1)).await;
    api.push_presence(Err(common::network_error()));

    sleep(Duration::from_secs(305)).await;
    assert!(api.set_presence_calls().is_empty());
    assert_eq!(probe_pings(&transport), 1);
    assert!(!task.is_finished());

    shutdown.trigger();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn configured_refresh_interval_is_honoured() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new().with_auto_pong();
    let shutdown = ShutdownSignal::new();
    let mut config = common::create_test_config();
    config.presence.refresh_interval_secs = 60;
    let supervisor = Supervisor::new(api.clone(), transport.clone(), config, shutdown.clone());
    let task = tokio::spawn(supervisor.run());

    sleep(Duration::from_secs(121)).await;
    assert_eq!(api.set_presence_calls().len(), 2);
    assert_eq!(probe_pings(&transport), 2);
    assert_eq!(transport.opened().len(), 1);

    shutdown.trigger();
    task.await.unwrap().unwrap();
}

// ---- Presence events ----

#[tokio::test(start_paused = true)]
async fn involuntary_away_refreshes_then_reconnects() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new();
    let (task, shutdown) = spawn_supervisor(&api, &transport);
    sleep(Duration::from_secs(1)).await;

    api.set_default_presence(common::snapshot(Presence::Away, false));
    transport.emit(
        ConnectionId::new(1),
        TransportEventKind::Message(common::presence_event(USER, "away")),
    );
    sleep(Duration::from_secs(1)).await;

    assert_eq!(api.set_presence_calls(), vec![(PresenceMode::Auto, true)]);
    assert_eq!(transport.closed(), vec![ConnectionId::new(1)]);
    assert_eq!(
        transport.opened(),
        vec![ConnectionId::new(1), ConnectionId::new(2)]
    );

    shutdown.trigger();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn manual_away_event_causes_no_action() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new();
    let (task, shutdown) = spawn_supervisor(&api, &transport);
    sleep(Duration::from_secs(1)).await;

    api.set_default_presence(common::snapshot(Presence::Away, true));
    transport.emit(
        ConnectionId::new(1),
        TransportEventKind::Message(common::presence_event(USER, "away")),
    );
    sleep(Duration::from_secs(1)).await;

    assert!(api.set_presence_calls().is_empty());
    assert_eq!(transport.opened().len(), 1);

    shutdown.trigger();
    task.await.unwrap().unwrap();
}

// ---- Shutdown ----

#[tokio::test(start_paused = true)]
async fn shutdown_closes_connection_and_exits_cleanly() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new();
    let (task, shutdown) = spawn_supervisor(&api, &transport);
    sleep(Duration::from_secs(1)).await;

    assert!(shutdown.trigger());
    assert!(!shutdown.trigger(), "second trigger is a no-op");

    task.await.unwrap().unwrap();
    assert_eq!(transport.closed(), vec![ConnectionId::new(1)]);
    assert_eq!(transport.opened().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_reconnect_delay_does_not_reconnect() {
    let api = FakePresenceApi::new();
    let transport = FakeTransport::new();
    let (task, shutdown) = spawn_supervisor(&api, &transport);
    sleep(Duration::from_secs(1)).await;

    transport.emit(ConnectionId::new(1), TransportEventKind::Closed(None));
    sleep(Duration::from_secs(2)).await;
    shutdown.trigger();

    task.await.unwrap().unwrap();
    assert_eq!(transport.opened().len(), 1);
    assert_eq!(api.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_connect_failure_ends_run() {
    let api = FakePresenceApi::new();
    for _ in 0..6 {
        api.push_connect(Err(common::network_error()));
    }
    let transport = FakeTransport::new();
    let (task, _shutdown) = spawn_supervisor(&api, &transport);

    let err = task.await.unwrap().unwrap_err();

    assert!(matches!(
        err,
        KpError::RetriesExhausted {
            operation: "connect",
            ..
        }
    ));
    assert!(transport.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_refresh_in_flight() {
    let fake = FakePresenceApi::new();
    let api = SlowPresenceApi::new(fake.clone(), Duration::from_secs(30));
    let transport = FakeTransport::new().with_auto_pong();
    let shutdown = ShutdownSignal::new();
    let supervisor = Supervisor::new(
        api,
        transport.clone(),
        common::create_test_config(),
        shutdown.clone(),
    );
    let task = tokio::spawn(supervisor.run());

    // The refresh fires at 300s and its presence lookup stalls until 330s.
    sleep(Duration::from_secs(310)).await;
    assert!(!task.is_finished());
    assert!(fake.set_presence_calls().is_empty());

    let triggered = Instant::now();
    shutdown.trigger();
    task.await.unwrap().unwrap();

    assert!(triggered.elapsed() < Duration::from_secs(1));
    assert!(fake.set_presence_calls().is_empty());
    assert_eq!(probe_pings(&transport), 0);
    assert_eq!(transport.closed(), vec![ConnectionId::new(1)]);
}
