//! # Botkeeper
//!
//! Keeps user-configured chat bots connected to a messaging gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐ start/stop ┌─────────────────────────────────────────────┐
//! │  Boundary  │───────────▶│ Supervisor                                  │
//! │   layer    │            │  bot-1: worker ─▶ Dispatcher ─▶ handlers    │──▶ RecordStore
//! └────────────┘            │  bot-2: worker ─▶ Dispatcher ─▶ handlers    │
//!                           └─────────────────────────────────────────────┘
//!                                   ▲ events            │ replies, roles
//!                                   └──── Gateway ◀─────┘
//! ```
//!
//! - **Supervisor**: at most one live connection per bot, owner-checked
//! - **Handlers**: ready, message (commands), member joined, connection error
//! - **Statistics**: counters and server list written back to the bot record
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use botkeeper::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let connector = Arc::new(MemoryConnector::new());
//!     let supervisor = Supervisor::new(store, connector);
//!
//!     supervisor.start(&"bot-1".into(), &Requester::admin("root")).await?;
//!     supervisor.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `ws-client`: WebSocket gateway connector

pub use botkeeper_core as core;
pub use botkeeper_framework as framework;
pub use botkeeper_gateway as gateway;
pub use botkeeper_runtime as runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use botkeeper_runtime::{
        ApiError, BotkeeperConfig, ErrorKind, StartReport, Supervisor, SupervisorError,
    };

    // Records and store
    pub use botkeeper_core::{
        Bot, BotId, BotStatus, MemoryStore, OwnerId, RecordStore, Requester, Statistics,
    };

    // Gateway contract and connectors
    pub use botkeeper_core::{GatewayConnector, GatewayEvent, GatewaySession};
    pub use botkeeper_gateway::MemoryConnector;
    #[cfg(feature = "ws-client")]
    pub use botkeeper_gateway::WsConnector;

    // Custom handlers
    pub use botkeeper_framework::{Dispatcher, EventHandler, HandlerContext, Outcome};
}
