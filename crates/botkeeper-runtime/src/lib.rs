//! # Botkeeper Runtime
//!
//! Supervision of live bot connections.
//!
//! This crate provides:
//! - The [`Supervisor`]: idempotent `start`, safe `stop`, per-bot serialization
//! - One worker task per live bot running the framework [`Dispatcher`]
//!   (`botkeeper_framework::Dispatcher`) over the bot's event queue
//! - Coalescing persistence of status and statistics ([`FlushPolicy`])
//! - Layered configuration ([`config`]) and logging setup ([`logging`])
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use botkeeper_core::{MemoryStore, Requester};
//! use botkeeper_runtime::{Supervisor, config::load_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let store = Arc::new(MemoryStore::new());
//!     let connector = Arc::new(config.gateway.ws_connector(config.runtime.event_buffer));
//!
//!     let supervisor = Supervisor::from_config(&config, store, connector);
//!     supervisor.start(&"bot-1".into(), &Requester::admin("root")).await?;
//!
//!     // Run until Ctrl+C, then stop every bot
//!     supervisor.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
mod connection;
pub mod error;
pub mod flush;
pub mod logging;
pub mod supervisor;

pub use config::{BotkeeperConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{ApiError, ErrorKind, SupervisorError, SupervisorResult};
pub use flush::FlushPolicy;
pub use logging::{LoggingBuilder, SpanEvents};
pub use supervisor::{StartReport, Supervisor, SupervisorBuilder, SupervisorStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
