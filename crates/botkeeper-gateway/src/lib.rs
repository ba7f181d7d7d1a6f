//! # Botkeeper Gateway
//!
//! Implementations of the [`GatewayConnector`](botkeeper_core::GatewayConnector)
//! contract defined in `botkeeper-core`.
//!
//! ## Features
//!
//! - *(always)*: [`MemoryConnector`], an in-process loopback gateway used by
//!   tests and local runs. Events are injected through [`MemoryGateway`]
//!   handles and every outbound action is recorded.
//! - `ws-client`: [`WsConnector`], a JSON-over-WebSocket session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  botkeeper-runtime  │  (supervisor, per-bot workers)
//! ├─────────────────────┤
//! │  botkeeper-core     │  (GatewayConnector / GatewaySession traits)
//! ├─────────────────────┤
//! │  botkeeper-gateway  │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network / loopback │
//! └─────────────────────┘
//! ```

pub mod memory;

#[cfg(feature = "ws-client")]
pub mod websocket;

pub use memory::{MemoryConnector, MemoryGateway};

#[cfg(feature = "ws-client")]
pub use websocket::WsConnector;
