//! Event handlers.
//!
//! A handler reacts to one kind of [`GatewayEvent`]. Handlers run inside the
//! bot's worker, one event at a time, and receive a [`HandlerContext`] giving
//! them the mutable runtime state, the gateway session and a way to publish
//! the current state for persistence.

use async_trait::async_trait;

use botkeeper_core::{BotId, GatewayEvent, GatewaySession};

use crate::state::{BotRuntimeState, RuntimeSnapshot};

mod connection;
mod member;
mod message;
mod ready;

pub use connection::ConnectionErrorHandler;
pub use member::MemberJoinedHandler;
pub use message::MessageHandler;
pub use ready::ReadyHandler;

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event changed state or produced output.
    Handled,
    /// The event was deliberately left alone.
    Ignored,
}

/// Receives published runtime snapshots.
///
/// `flush` must not block: implementations hand the snapshot to something
/// that persists it later. Publishing a newer snapshot may supersede an older
/// one that has not been written yet.
pub trait FlushSink: Send + Sync {
    fn flush(&self, snapshot: RuntimeSnapshot);
}

/// Everything a handler may touch while processing one event.
pub struct HandlerContext<'a> {
    pub state: &'a mut BotRuntimeState,
    pub session: &'a dyn GatewaySession,
    sink: &'a dyn FlushSink,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        state: &'a mut BotRuntimeState,
        session: &'a dyn GatewaySession,
        sink: &'a dyn FlushSink,
    ) -> Self {
        Self {
            state,
            session,
            sink,
        }
    }

    pub fn bot_id(&self) -> &BotId {
        self.state.bot_id()
    }

    /// Publishes the current state for persistence.
    pub fn flush(&self) {
        self.sink.flush(self.state.snapshot());
    }
}

/// A reaction to gateway events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Returns whether this handler wants `event`.
    fn check(&self, event: &GatewayEvent) -> bool;

    /// Processes an event that passed [`check`](Self::check).
    async fn handle(&self, ctx: &mut HandlerContext<'_>, event: &GatewayEvent) -> Outcome;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use botkeeper_core::{
        Bot, BotDraft, BotId, CommandDraft, Credential, GatewayError, GatewayResult,
        GatewaySession, MessageTarget, OutboundAction, OwnerId,
    };

    use super::FlushSink;
    use crate::state::{BotRuntimeState, RuntimeSnapshot};

    /// Session that records actions and can be told to fail.
    #[derive(Default)]
    pub struct RecordingSession {
        pub actions: Mutex<Vec<OutboundAction>>,
        pub fail_sends: Mutex<bool>,
        pub fail_grants: Mutex<bool>,
    }

    #[async_trait]
    impl GatewaySession for RecordingSession {
        async fn send_text(&self, target: &MessageTarget, content: &str) -> GatewayResult<()> {
            if *self.fail_sends.lock() {
                return Err(GatewayError::SendFailed("rate limited".into()));
            }
            self.actions.lock().push(OutboundAction::SendText {
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
            if *self.fail_grants.lock() {
                return Err(GatewayError::RoleGrantFailed {
                    role_id: role_id.into(),
                    reason: "forbidden".into(),
                });
            }
            self.actions.lock().push(OutboundAction::GrantRole {
                server_id: server_id.into(),
                member_id: member_id.into(),
                role_id: role_id.into(),
            });
            Ok(())
        }

        async fn close(&self) {}
    }

    #[derive(Default)]
    pub struct RecordingSink {
        pub snapshots: Mutex<Vec<RuntimeSnapshot>>,
    }

    impl RecordingSink {
        pub fn count(&self) -> usize {
            self.snapshots.lock().len()
        }

        pub fn last(&self) -> Option<RuntimeSnapshot> {
            self.snapshots.lock().last().cloned()
        }
    }

    impl FlushSink for RecordingSink {
        fn flush(&self, snapshot: RuntimeSnapshot) {
            self.snapshots.lock().push(snapshot);
        }
    }

    /// A bot named "Helper" with prefix `!` and a `ping → pong` command.
    pub fn bot() -> Bot {
        let mut bot = Bot::from_draft(
            BotId::new("bot-1"),
            OwnerId::new("alice"),
            BotDraft {
                name: "Helper".into(),
                credential: Credential::new("token"),
                ..Default::default()
            },
        )
        .unwrap();
        bot.commands
            .add(CommandDraft {
                name: "ping".into(),
                response: "pong".into(),
                ..Default::default()
            })
            .unwrap();
        bot
    }

    pub fn fixture(bot: Bot) -> (BotRuntimeState, Arc<RecordingSession>, RecordingSink) {
        (
            BotRuntimeState::new(bot),
            Arc::new(RecordingSession::default()),
            RecordingSink::default(),
        )
    }
}
