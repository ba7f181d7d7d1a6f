//! Gateway session contract.
//!
//! A [`GatewayConnector`] opens one session per bot. Opening never blocks on
//! the login handshake: the returned [`GatewayConnection`] carries an event
//! queue that first yields [`GatewayEvent::Ready`] on success, or
//! [`GatewayEvent::ConnectionError`] if the credential is rejected or the
//! transport fails. Events are delivered in the order the gateway sent them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GatewayResult;
use crate::record::{BotId, Credential, ServerSnapshot};

// =============================================================================
// Inbound Events
// =============================================================================

/// A server the bot is a member of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub member_count: u64,
}

impl From<&ServerInfo> for ServerSnapshot {
    fn from(server: &ServerInfo) -> Self {
        Self {
            server_id: server.id.clone(),
            server_name: server.name.clone(),
            member_count: server.member_count,
        }
    }
}

/// Author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    /// Set for automated accounts, including the bot itself.
    #[serde(default)]
    pub is_bot: bool,
}

/// A chat message seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub server_id: Option<String>,
    pub channel_id: String,
    pub author: Author,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// A member joined one of the bot's servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberJoin {
    pub server: ServerInfo,
    pub member_id: String,
    pub member_name: String,
    pub at: DateTime<Utc>,
}

/// Events delivered by a gateway session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Login succeeded; `servers` is the full set of joined servers.
    Ready {
        servers: Vec<ServerInfo>,
        at: DateTime<Utc>,
    },
    /// A chat message arrived.
    MessageReceived(InboundMessage),
    /// A member joined a server.
    MemberJoined(MemberJoin),
    /// Login was rejected or the session was lost.
    ConnectionError { reason: String, at: DateTime<Utc> },
}

impl GatewayEvent {
    /// Returns a short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::MessageReceived(_) => "message_received",
            Self::MemberJoined(_) => "member_joined",
            Self::ConnectionError { .. } => "connection_error",
        }
    }

    /// Returns when the gateway produced the event.
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Ready { at, .. } | Self::ConnectionError { at, .. } => *at,
            Self::MessageReceived(message) => message.at,
            Self::MemberJoined(join) => join.at,
        }
    }

    /// Builds a connection error stamped with the current time.
    pub fn connection_error(reason: impl Into<String>) -> Self {
        Self::ConnectionError {
            reason: reason.into(),
            at: Utc::now(),
        }
    }
}

// =============================================================================
// Outbound Actions
// =============================================================================

/// Where a text message is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageTarget {
    /// A channel of a server.
    Channel(String),
    /// A direct message to a member.
    Member(String),
}

/// An action a bot performs on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OutboundAction {
    SendText {
        target: MessageTarget,
        content: String,
    },
    GrantRole {
        server_id: String,
        member_id: String,
        role_id: String,
    },
}

/// One live session to the gateway.
#[async_trait]
pub trait GatewaySession: Send + Sync {
    /// Sends a text message.
    async fn send_text(&self, target: &MessageTarget, content: &str) -> GatewayResult<()>;

    /// Grants a role to a member of a server.
    async fn grant_role(&self, server_id: &str, member_id: &str, role_id: &str)
    -> GatewayResult<()>;

    /// Closes the session. Returns once the transport has shut down.
    async fn close(&self);
}

/// A shared gateway session.
pub type BoxedSession = Arc<dyn GatewaySession>;

/// A freshly opened session and its inbound event queue.
pub struct GatewayConnection {
    pub session: BoxedSession,
    pub events: mpsc::Receiver<GatewayEvent>,
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection").finish_non_exhaustive()
    }
}

/// Opens gateway sessions.
pub trait GatewayConnector: Send + Sync {
    /// Starts logging in with `credential` and returns immediately.
    fn open(&self, bot_id: &BotId, credential: &Credential) -> GatewayConnection;
}

/// A shared connector.
pub type BoxedConnector = Arc<dyn GatewayConnector>;
