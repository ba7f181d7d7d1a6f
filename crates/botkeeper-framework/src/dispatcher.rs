//! Event dispatcher.
//!
//! The [`Dispatcher`] holds an ordered list of [`EventHandler`]s. Each event
//! is offered to every handler in registration order; handlers whose
//! [`check`](EventHandler::check) passes run one after another, never
//! concurrently, so a handler always sees the state left by the previous one.
//!
//! ```rust,ignore
//! use botkeeper_framework::{Dispatcher, MessageHandler};
//!
//! let dispatcher = Dispatcher::new()
//!     .with(MessageHandler)
//!     .with(AuditHandler::default());
//! ```

use std::sync::Arc;

use tracing::{Instrument, debug, debug_span};

use botkeeper_core::GatewayEvent;

use crate::handler::{
    ConnectionErrorHandler, EventHandler, HandlerContext, MemberJoinedHandler, MessageHandler,
    Outcome, ReadyHandler,
};

/// Routes gateway events to handlers.
#[derive(Default, Clone)]
pub struct Dispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Creates a dispatcher with the built-in handlers for every event kind.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(ReadyHandler)
            .with(MessageHandler)
            .with(MemberJoinedHandler)
            .with(ConnectionErrorHandler)
    }

    /// Adds a handler. Handlers run in the order they are added.
    pub fn add(&mut self, handler: impl EventHandler + 'static) {
        self.handlers.push(Arc::new(handler));
    }

    /// Adds a handler (builder pattern).
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.add(handler);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatches one event.
    ///
    /// Returns `Handled` if any handler handled the event.
    pub async fn dispatch(&self, ctx: &mut HandlerContext<'_>, event: &GatewayEvent) -> Outcome {
        let span = debug_span!("dispatch", bot_id = %ctx.bot_id(), event = event.name());

        async {
            let mut outcome = Outcome::Ignored;
            for handler in self.handlers.iter().filter(|h| h.check(event)) {
                if handler.handle(ctx, event).await == Outcome::Handled {
                    outcome = Outcome::Handled;
                }
            }
            if outcome == Outcome::Ignored {
                debug!("No handler took the event");
            }
            outcome
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use botkeeper_core::{Author, BotStatus, InboundMessage};

    use super::*;
    use crate::handler::test_support::{bot, fixture};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn check(&self, _event: &GatewayEvent) -> bool {
            true
        }

        async fn handle(&self, _ctx: &mut HandlerContext<'_>, _event: &GatewayEvent) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Outcome::Ignored
        }
    }

    fn chat(content: &str) -> GatewayEvent {
        GatewayEvent::MessageReceived(InboundMessage {
            server_id: None,
            channel_id: "c1".into(),
            author: Author {
                id: "u1".into(),
                name: "alice".into(),
                is_bot: false,
            },
            content: content.into(),
            at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_defaults_cover_every_event() {
        let dispatcher = Dispatcher::with_defaults();
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        let ready = GatewayEvent::Ready {
            servers: Vec::new(),
            at: Utc::now(),
        };
        assert_eq!(dispatcher.dispatch(&mut ctx, &ready).await, Outcome::Handled);
        assert_eq!(dispatcher.dispatch(&mut ctx, &chat("!ping")).await, Outcome::Handled);
        assert_eq!(
            dispatcher
                .dispatch(&mut ctx, &GatewayEvent::connection_error("lost"))
                .await,
            Outcome::Handled
        );

        let snapshot = sink.last().unwrap();
        assert_eq!(snapshot.status, BotStatus::Error);
        assert_eq!(snapshot.statistics.commands_used, 1);
    }

    #[tokio::test]
    async fn test_every_matching_handler_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new()
            .with(Counting {
                calls: Arc::clone(&calls),
            })
            .with(MessageHandler);
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        let outcome = dispatcher.dispatch(&mut ctx, &chat("hello")).await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.handler_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_dispatcher_ignores() {
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        let outcome = Dispatcher::new().dispatch(&mut ctx, &chat("hello")).await;
        assert_eq!(outcome, Outcome::Ignored);
    }
}
