//! JSON-over-WebSocket gateway session.
//!
//! Each session owns one socket task:
//!
//! ```text
//!  WsSession ──ops──►  ┌──────────────┐  ──text frames──►  gateway
//!                      │ session task │
//!  events   ◄─event──  └──────────────┘  ◄─text frames───
//! ```
//!
//! The task sends an `identify` frame with the credential, then relays
//! outbound actions and decodes inbound frames until the session is closed or
//! the transport fails. Failures are reported once as a connection error; the
//! task never reconnects on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use botkeeper_core::{
    Author, BotId, Credential, GatewayConnection, GatewayConnector, GatewayError, GatewayEvent,
    GatewayResult, GatewaySession, InboundMessage, MemberJoin, MessageTarget, OutboundAction,
    ServerInfo,
};

const DEFAULT_BUFFER: usize = 256;
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

// =============================================================================
// Connector
// =============================================================================

/// Opens WebSocket sessions against one gateway URL.
///
/// [`open`](GatewayConnector::open) spawns the socket task and must be called
/// from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    heartbeat: Duration,
    buffer: usize,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat: DEFAULT_HEARTBEAT,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Sets the interval between keep-alive pings.
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        // `tokio::time::interval` rejects a zero period
        self.heartbeat = heartbeat.max(Duration::from_millis(1));
        self
    }

    /// Sets the capacity of the inbound and outbound queues.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl GatewayConnector for WsConnector {
    fn open(&self, bot_id: &BotId, credential: &Credential) -> GatewayConnection {
        let (events_tx, events_rx) = mpsc::channel(self.buffer);
        let (ops_tx, ops_rx) = mpsc::channel(self.buffer);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_session(SessionTask {
            bot_id: bot_id.clone(),
            url: self.url.clone(),
            credential: credential.clone(),
            heartbeat: self.heartbeat,
            events: events_tx,
            ops: ops_rx,
            cancel: cancel.clone(),
        }));

        GatewayConnection {
            session: Arc::new(WsSession {
                bot_id: bot_id.clone(),
                ops: ops_tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
            events: events_rx,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Handle to a socket task. Actions are queued; delivery errors surface as
/// warnings in the task rather than as results here.
struct WsSession {
    bot_id: BotId,
    ops: mpsc::Sender<OutboundAction>,
    cancel: CancellationToken,
    /// Taken by the first `close`.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsSession {
    async fn enqueue(&self, action: OutboundAction) -> GatewayResult<()> {
        if self.cancel.is_cancelled() {
            return Err(GatewayError::Closed);
        }
        self.ops.send(action).await.map_err(|_| GatewayError::Closed)
    }
}

#[async_trait]
impl GatewaySession for WsSession {
    async fn send_text(&self, target: &MessageTarget, content: &str) -> GatewayResult<()> {
        self.enqueue(OutboundAction::SendText {
            target: target.clone(),
            content: content.to_string(),
        })
        .await
    }

    async fn grant_role(
        &self,
        server_id: &str,
        member_id: &str,
        role_id: &str,
    ) -> GatewayResult<()> {
        self.enqueue(OutboundAction::GrantRole {
            server_id: server_id.to_string(),
            member_id: member_id.to_string(),
            role_id: role_id.to_string(),
        })
        .await
    }

    /// Cancels the socket task and waits until it has closed the socket.
    async fn close(&self) {
        debug!(bot_id = %self.bot_id, "Closing WebSocket session");
        self.cancel.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(bot_id = %self.bot_id, error = %e, "WebSocket task ended abnormally");
        }
    }
}

// =============================================================================
// Wire Format
// =============================================================================

/// Inbound frames, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Ready {
        #[serde(default)]
        servers: Vec<ServerInfo>,
    },
    Message {
        #[serde(default)]
        server_id: Option<String>,
        channel_id: String,
        author: Author,
        content: String,
    },
    MemberJoin {
        server: ServerInfo,
        member_id: String,
        member_name: String,
    },
    Error {
        reason: String,
    },
}

impl WireEvent {
    fn into_event(self) -> GatewayEvent {
        let at = chrono::Utc::now();
        match self {
            Self::Ready { servers } => GatewayEvent::Ready { servers, at },
            Self::Message {
                server_id,
                channel_id,
                author,
                content,
            } => GatewayEvent::MessageReceived(InboundMessage {
                server_id,
                channel_id,
                author,
                content,
                at,
            }),
            Self::MemberJoin {
                server,
                member_id,
                member_name,
            } => GatewayEvent::MemberJoined(MemberJoin {
                server,
                member_id,
                member_name,
                at,
            }),
            Self::Error { reason } => GatewayEvent::ConnectionError { reason, at },
        }
    }
}

fn identify_frame(credential: &Credential) -> String {
    serde_json::json!({ "op": "identify", "token": credential.expose() }).to_string()
}

// =============================================================================
// Socket Task
// =============================================================================

struct SessionTask {
    bot_id: BotId,
    url: String,
    credential: Credential,
    heartbeat: Duration,
    events: mpsc::Sender<GatewayEvent>,
    ops: mpsc::Receiver<OutboundAction>,
    cancel: CancellationToken,
}

impl SessionTask {
    async fn report(&self, reason: String) {
        warn!(bot_id = %self.bot_id, reason = %reason, "Gateway session failed");
        let _ = self.events.send(GatewayEvent::connection_error(reason)).await;
    }
}

async fn run_session(mut task: SessionTask) {
    info!(bot_id = %task.bot_id, url = %task.url, "Connecting to gateway");

    let connected = tokio::select! {
        _ = task.cancel.cancelled() => return,
        result = connect_async(task.url.as_str()) => result,
    };
    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let err = GatewayError::ConnectionFailed {
                reason: e.to_string(),
            };
            task.report(err.to_string()).await;
            return;
        }
    };
    let (mut sink, mut source) = stream.split();

    if let Err(e) = sink
        .send(Message::Text(identify_frame(&task.credential).into()))
        .await
    {
        task.report(format!("identify failed: {e}")).await;
        return;
    }

    let mut heartbeat = tokio::time::interval(task.heartbeat);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = task.cancel.cancelled() => {
                let _ = sink.close().await;
                info!(bot_id = %task.bot_id, "Gateway session closed");
                break;
            }

            action = task.ops.recv() => {
                let Some(action) = action else {
                    let _ = sink.close().await;
                    break;
                };
                match serde_json::to_string(&action) {
                    Ok(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            warn!(bot_id = %task.bot_id, error = %e, "Failed to send action");
                        }
                    }
                    Err(e) => warn!(bot_id = %task.bot_id, error = %e, "Failed to encode action"),
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new().into())).await {
                    task.report(format!("heartbeat failed: {e}")).await;
                    break;
                }
            }

            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    trace!(bot_id = %task.bot_id, len = text.len(), "Received frame");
                    match serde_json::from_str::<WireEvent>(text.as_str()) {
                        Ok(event) => {
                            if task.events.send(event.into_event()).await.is_err() {
                                let _ = sink.close().await;
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(bot_id = %task.bot_id, error = %e, "Ignoring malformed frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    task.report("gateway closed the connection".to_string()).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    task.report(format!("socket error: {e}")).await;
                    break;
                }
            },
        }
    }
}
