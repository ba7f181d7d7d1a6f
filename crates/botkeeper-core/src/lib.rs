//! # Botkeeper Core
//!
//! Shared building blocks for the botkeeper runtime.
//!
//! ## Layers
//!
//! ### Records
//!
//! Persisted entities and their invariants:
//! - **Bots**: configuration, command table, feature settings, runtime status
//!   and statistics ([`Bot`], [`CommandTable`], [`BotSettings`], [`Statistics`])
//! - **Owners**: who owns which bot, and the resolved [`Requester`] identity
//!   used for every authorization decision
//!
//! ### Store
//!
//! The [`RecordStore`] contract the runtime persists through, plus the
//! [`MemoryStore`] implementation used by tests and the demo console.
//!
//! ### Gateway
//!
//! The contract of one live session to the messaging gateway: the inbound
//! [`GatewayEvent`] stream and the outbound [`GatewaySession`] actions.
//!
//! ```text
//! ┌──────────────┐  open(credential)  ┌──────────────────┐
//! │  Supervisor  │───────────────────▶│ GatewayConnector │
//! └──────────────┘                    └──────────────────┘
//!        │                                     │
//!        │ load / save                         ▼
//!        ▼                           GatewayConnection {
//! ┌──────────────┐                     session: GatewaySession,
//! │ RecordStore  │                     events:  mpsc::Receiver<GatewayEvent>,
//! └──────────────┘                   }
//! ```

pub mod error;
pub mod gateway;
pub mod record;
pub mod store;

pub use error::{GatewayError, GatewayResult, StoreError, StoreResult};
pub use gateway::{
    Author, BoxedConnector, BoxedSession, GatewayConnection, GatewayConnector, GatewayEvent,
    GatewaySession, InboundMessage, MemberJoin, MessageTarget, OutboundAction, ServerInfo,
};
pub use record::{
    AutoRole, Bot, BotDraft, BotId, BotPatch, BotSettings, BotStatus, Command, CommandDraft,
    CommandId, CommandPatch, CommandTable, Credential, Moderation, Owner, OwnerId, Requester,
    ServerSnapshot, SettingsPatch, Statistics, WelcomeMessage,
};
pub use store::{BoxedStore, MemoryStore, RecordStore};

/// Prelude for common imports.
pub mod prelude {
    pub use super::gateway::{GatewayConnector, GatewayEvent, GatewaySession, MessageTarget};
    pub use super::record::{Bot, BotId, BotStatus, OwnerId, Requester};
    pub use super::store::RecordStore;
}
