//! Streaming transport abstraction and its WebSocket implementation.
//!
//! A transport connection reports its lifecycle as [`TransportEvent`]s sent
//! into a channel owned by the supervisor loop. Every event carries the
//! [`ConnectionId`] of the connection that produced it, so events from a
//! superseded connection can be recognised and dropped. Each connection
//! ends with exactly one `Closed` or `Errored` event.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use kp_core::constants;
use kp_core::error::{KpError, KpResult};

/// Identity of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection #{}", self.0)
    }
}

/// What happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The connection is open and can carry messages.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// A pong answering one of our pings arrived.
    Pong(Vec<u8>),
    /// The connection closed; carries the close reason if any.
    Closed(Option<String>),
    /// The connection failed.
    Errored(String),
}

/// A transport event tagged with its source connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    pub kind: TransportEventKind,
}

/// Channel end that transports report events into.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Parameters for opening one connection.
#[derive(Debug, Clone)]
pub struct OpenParams {
    pub id: ConnectionId,
    pub url: String,
    /// Interval between automatic keepalive pings.
    pub keepalive: Duration,
}

/// Factory for transport connections.
#[async_trait]
pub trait Transport: Send + Sync {
    type Handle: TransportHandle;

    /// Open a connection.
    ///
    /// Handshake failures are returned as errors; once this returns `Ok`, an
    /// `Opened` event has been queued and all later failures arrive as events.
    async fn open(&self, params: OpenParams, events: EventSender) -> KpResult<Self::Handle>;
}

/// Control side of one open connection.
pub trait TransportHandle: Send {
    fn id(&self) -> ConnectionId;

    /// Queue a text frame.
    fn send(&self, payload: String) -> KpResult<()>;

    /// Queue a ping; a matching `Pong` event follows if the peer is alive.
    fn ping(&self, payload: Vec<u8>) -> KpResult<()>;

    /// Start closing the connection. Idempotent.
    fn close(&mut self);
}

/// Commands from a handle to its pump task.
#[derive(Debug)]
enum Command {
    Send(String),
    Ping(Vec<u8>),
    Close,
}

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsTransport {
    handshake_timeout: Duration,
}

impl WsTransport {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Handle = WsHandle;

    async fn open(&self, params: OpenParams, events: EventSender) -> KpResult<WsHandle> {
        let handshake = connect_async(params.url.as_str());
        let (stream, _) = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| {
                KpError::Timeout(format!(
                    "websocket handshake took longer than {}s",
                    self.handshake_timeout.as_secs()
                ))
            })?
            .map_err(|e| KpError::Socket(format!("websocket connect failed: {e}")))?;

        let (commands, command_rx) = mpsc::unbounded_channel();

        // Queue Opened before the pump can report anything else.
        let _ = events.send(TransportEvent {
            connection: params.id,
            kind: TransportEventKind::Opened,
        });
        tokio::spawn(pump(params.id, stream, command_rx, events, params.keepalive));

        Ok(WsHandle {
            id: params.id,
            commands,
        })
    }
}

/// Handle to a WebSocket connection. Dropping it closes the connection.
#[derive(Debug)]
pub struct WsHandle {
    id: ConnectionId,
    commands: mpsc::UnboundedSender<Command>,
}

impl WsHandle {
    fn command(&self, command: Command) -> KpResult<()> {
        self.commands
            .send(command)
            .map_err(|_| KpError::Socket(format!("{} is no longer running", self.id)))
    }
}

impl TransportHandle for WsHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: String) -> KpResult<()> {
        self.command(Command::Send(payload))
    }

    fn ping(&self, payload: Vec<u8>) -> KpResult<()> {
        self.command(Command::Ping(payload))
    }

    fn close(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Drive one WebSocket until it ends, forwarding frames as events.
async fn pump(
    id: ConnectionId,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: EventSender,
    keepalive: Duration,
) {
    let (mut sink, mut source) = stream.split();
    let mut keepalive = interval_at(Instant::now() + keepalive, keepalive);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let forward = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent {
            connection: id,
            kind,
        });
    };

    let terminal = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break TransportEventKind::Errored(e.to_string());
                    }
                }
                Some(Command::Ping(payload)) => {
                    if let Err(e) = sink.send(Message::Ping(payload)).await {
                        break TransportEventKind::Errored(e.to_string());
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    break TransportEventKind::Closed(Some("closed locally".into()));
                }
            },
            _ = keepalive.tick() => {
                let ping = Message::Ping(constants::KEEPALIVE_PAYLOAD.to_vec());
                if let Err(e) = sink.send(ping).await {
                    break TransportEventKind::Errored(e.to_string());
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => forward(TransportEventKind::Message(text)),
                Some(Ok(Message::Pong(payload))) => forward(TransportEventKind::Pong(payload)),
                Some(Ok(Message::Close(frame))) => {
                    break TransportEventKind::Closed(frame.map(|f| f.reason.to_string()));
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(other)) => debug!("{id}: ignoring {} byte non-text frame", other.len()),
                Some(Err(e)) => break TransportEventKind::Errored(e.to_string()),
                None => break TransportEventKind::Closed(None),
            },
        }
    };

    match &terminal {
        TransportEventKind::Errored(e) => warn!("{id} failed: {e}"),
        _ => debug!("{id} ended"),
    }
    forward(terminal);
}
