//! # Botkeeper Framework
//!
//! Per-bot event processing: what a live bot does with each gateway event.
//!
//! ## Components
//!
//! - [`Dispatcher`]: ordered list of [`EventHandler`]s run for every event
//! - Built-in handlers: [`ReadyHandler`], [`MessageHandler`],
//!   [`MemberJoinedHandler`], [`ConnectionErrorHandler`]
//! - [`CommandRouter`]: prefix + case-insensitive command table lookup
//! - [`StatisticsAggregator`]: monotonic counters and server inventory
//! - [`TemplateVars`]: `{placeholder}` substitution for welcome messages
//! - [`BotRuntimeState`]: the state a worker mutates, and the
//!   [`RuntimeSnapshot`] it publishes through a [`FlushSink`]
//!
//! ## Event Flow
//!
//! ```text
//! GatewayEvent ──► Dispatcher ──► EventHandler::check ──► EventHandler::handle
//!                                                              │
//!                          ┌───────────────────────────────────┤
//!                          ▼                                   ▼
//!                 GatewaySession (send / grant)     BotRuntimeState ──flush──► FlushSink
//! ```

pub mod command;
pub mod dispatcher;
pub mod handler;
pub mod state;
pub mod stats;
pub mod template;

pub use command::{CommandMatch, CommandRouter};
pub use dispatcher::Dispatcher;
pub use handler::{
    ConnectionErrorHandler, EventHandler, FlushSink, HandlerContext, MemberJoinedHandler,
    MessageHandler, Outcome, ReadyHandler,
};
pub use state::{BotRuntimeState, RuntimeSnapshot};
pub use stats::StatisticsAggregator;
pub use template::{Placeholder, TemplateVars};

/// Prelude for common imports.
pub mod prelude {
    pub use super::dispatcher::Dispatcher;
    pub use super::handler::{EventHandler, FlushSink, HandlerContext, Outcome};
    pub use super::state::{BotRuntimeState, RuntimeSnapshot};
}
