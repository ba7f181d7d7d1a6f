//! In-process loopback gateway.
//!
//! [`MemoryConnector`] hands out sessions whose "remote side" is a
//! [`MemoryGateway`] handle: callers push inbound events through it and read
//! back every outbound action the bot performed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use botkeeper_core::{
    Author, BotId, Credential, GatewayConnection, GatewayConnector, GatewayError, GatewayEvent,
    GatewayResult, GatewaySession, InboundMessage, MemberJoin, MessageTarget, OutboundAction,
    ServerInfo,
};

const DEFAULT_BUFFER: usize = 256;

/// Loopback [`GatewayConnector`].
///
/// The most recent session of every bot is kept for inspection through
/// [`gateway`](Self::gateway), so the set of handles grows with the number
/// of distinct bots opened.
///
/// By default every opened session immediately reports `Ready` with the
/// configured server list. Empty credentials and credentials registered with
/// [`reject_credential`](Self::reject_credential) get a `ConnectionError`
/// instead.
pub struct MemoryConnector {
    buffer: usize,
    servers: Vec<ServerInfo>,
    auto_ready: bool,
    rejected: Mutex<HashSet<String>>,
    gateways: Mutex<HashMap<BotId, MemoryGateway>>,
    opened: AtomicUsize,
}

impl MemoryConnector {
    /// Creates a connector with default settings.
    pub fn new() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
            servers: Vec::new(),
            auto_ready: true,
            rejected: Mutex::new(HashSet::new()),
            gateways: Mutex::new(HashMap::new()),
            opened: AtomicUsize::new(0),
        }
    }

    /// Sets the capacity of each session's event queue.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Sets the servers reported by the automatic `Ready` event.
    pub fn with_servers(mut self, servers: Vec<ServerInfo>) -> Self {
        self.servers = servers;
        self
    }

    /// Disables the automatic `Ready` event.
    pub fn without_auto_ready(mut self) -> Self {
        self.auto_ready = false;
        self
    }

    /// Makes future logins with this secret fail.
    pub fn reject_credential(&self, secret: impl Into<String>) {
        self.rejected.lock().insert(secret.into());
    }

    /// Returns the remote side of the most recent session opened for a bot.
    pub fn gateway(&self, bot_id: &BotId) -> Option<MemoryGateway> {
        self.gateways.lock().get(bot_id).cloned()
    }

    /// Returns how many sessions have been opened in total.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn accepts(&self, credential: &Credential) -> bool {
        !credential.is_empty() && !self.rejected.lock().contains(credential.expose())
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayConnector for MemoryConnector {
    fn open(&self, bot_id: &BotId, credential: &Credential) -> GatewayConnection {
        let (events_tx, events_rx) = mpsc::channel(self.buffer);
        let state = Arc::new(GatewayState {
            bot_id: bot_id.clone(),
            events: events_tx,
            sent: Mutex::new(Vec::new()),
            fail_role_grants: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let first = if !self.accepts(credential) {
            Some(GatewayEvent::connection_error("credential rejected"))
        } else if self.auto_ready {
            Some(GatewayEvent::Ready {
                servers: self.servers.clone(),
                at: Utc::now(),
            })
        } else {
            None
        };
        if let Some(event) = first {
            // The queue is fresh, so the first event always fits.
            let _ = state.events.try_send(event);
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.gateways.lock().insert(
            bot_id.clone(),
            MemoryGateway {
                state: Arc::clone(&state),
            },
        );
        debug!(bot_id = %bot_id, "Opened loopback session");

        GatewayConnection {
            session: Arc::new(MemorySession { state }),
            events: events_rx,
        }
    }
}

struct GatewayState {
    bot_id: BotId,
    events: mpsc::Sender<GatewayEvent>,
    sent: Mutex<Vec<OutboundAction>>,
    fail_role_grants: AtomicBool,
    closed: AtomicBool,
}

/// Remote side of a loopback session.
#[derive(Clone)]
pub struct MemoryGateway {
    state: Arc<GatewayState>,
}

impl MemoryGateway {
    /// Delivers an event to the bot. Returns `false` once the session is gone.
    pub async fn emit(&self, event: GatewayEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        trace!(bot_id = %self.state.bot_id, event = event.name(), "Emitting event");
        self.state.events.send(event).await.is_ok()
    }

    /// Delivers a `Ready` event.
    pub async fn ready(&self, servers: Vec<ServerInfo>) -> bool {
        self.emit(GatewayEvent::Ready {
            servers,
            at: Utc::now(),
        })
        .await
    }

    /// Delivers a chat message in `channel_id`.
    pub async fn message(&self, channel_id: &str, author: Author, content: &str) -> bool {
        self.emit(GatewayEvent::MessageReceived(InboundMessage {
            server_id: None,
            channel_id: channel_id.to_string(),
            author,
            content: content.to_string(),
            at: Utc::now(),
        }))
        .await
    }

    /// Delivers a member-joined event.
    pub async fn member_joined(&self, server: ServerInfo, member_id: &str, member_name: &str) -> bool {
        self.emit(GatewayEvent::MemberJoined(MemberJoin {
            server,
            member_id: member_id.to_string(),
            member_name: member_name.to_string(),
            at: Utc::now(),
        }))
        .await
    }

    /// Simulates transport loss.
    pub async fn drop_connection(&self, reason: &str) -> bool {
        self.emit(GatewayEvent::connection_error(reason)).await
    }

    /// Returns every action the bot performed, in order.
    pub fn sent(&self) -> Vec<OutboundAction> {
        self.state.sent.lock().clone()
    }

    /// Makes subsequent role grants fail.
    pub fn fail_role_grants(&self, fail: bool) {
        self.state.fail_role_grants.store(fail, Ordering::SeqCst);
    }

    /// Returns whether the bot closed the session.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

struct MemorySession {
    state: Arc<GatewayState>,
}

impl MemorySession {
    fn ensure_open(&self) -> GatewayResult<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            Err(GatewayError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GatewaySession for MemorySession {
    async fn send_text(&self, target: &MessageTarget, content: &str) -> GatewayResult<()> {
        self.ensure_open()?;
        self.state.sent.lock().push(OutboundAction::SendText {
            target: target.clone(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn grant_role(
        &self,
        server_id: &str,
        member_id: &str,
        role_id: &str,
    ) -> GatewayResult<()> {
        self.ensure_open()?;
        if self.state.fail_role_grants.load(Ordering::SeqCst) {
            return Err(GatewayError::RoleGrantFailed {
                role_id: role_id.to_string(),
                reason: "missing permissions".to_string(),
            });
        }
        self.state.sent.lock().push(OutboundAction::GrantRole {
            server_id: server_id.to_string(),
            member_id: member_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        debug!(bot_id = %self.state.bot_id, "Closed loopback session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str) -> ServerInfo {
        ServerInfo {
            id: id.into(),
            name: format!("Server {id}"),
            member_count: 3,
        }
    }

    #[tokio::test]
    async fn test_open_reports_ready() {
        let connector = MemoryConnector::new().with_servers(vec![server("s1")]);
        let mut conn = connector.open(&BotId::new("b1"), &Credential::new("token"));

        match conn.events.recv().await {
            Some(GatewayEvent::Ready { servers, .. }) => assert_eq!(servers, vec![server("s1")]),
            other => panic!("expected ready, got {other:?}"),
        }
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_rejected_credential_reports_error() {
        let connector = MemoryConnector::new();
        connector.reject_credential("bad");
        let mut conn = connector.open(&BotId::new("b1"), &Credential::new("bad"));

        assert!(matches!(
            conn.events.recv().await,
            Some(GatewayEvent::ConnectionError { .. })
        ));
    }

    #[tokio::test]
    async fn test_actions_are_recorded_until_closed() {
        let connector = MemoryConnector::new().without_auto_ready();
        let bot_id = BotId::new("b1");
        let conn = connector.open(&bot_id, &Credential::new("token"));
        let gateway = connector.gateway(&bot_id).unwrap();

        let target = MessageTarget::Channel("c1".into());
        conn.session.send_text(&target, "hi").await.unwrap();
        conn.session.close().await;

        assert!(matches!(
            conn.session.send_text(&target, "late").await,
            Err(GatewayError::Closed)
        ));
        assert_eq!(gateway.sent().len(), 1);
        assert!(gateway.is_closed());
        assert!(!gateway.drop_connection("gone").await);
    }

    #[tokio::test]
    async fn test_failing_role_grants() {
        let connector = MemoryConnector::new().without_auto_ready();
        let bot_id = BotId::new("b1");
        let conn = connector.open(&bot_id, &Credential::new("token"));
        let gateway = connector.gateway(&bot_id).unwrap();

        gateway.fail_role_grants(true);
        assert!(conn.session.grant_role("s1", "m1", "r1").await.is_err());
        assert!(gateway.sent().is_empty());
    }
}
