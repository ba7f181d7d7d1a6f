use async_trait::async_trait;
use tracing::{debug, warn};

use botkeeper_core::{GatewayEvent, MessageTarget};

use super::{EventHandler, HandlerContext, Outcome};
use crate::command::CommandRouter;

/// Counts messages and answers commands from the bot's table.
#[derive(Debug, Default)]
pub struct MessageHandler;

#[async_trait]
impl EventHandler for MessageHandler {
    fn name(&self) -> &'static str {
        "message"
    }

    fn check(&self, event: &GatewayEvent) -> bool {
        matches!(event, GatewayEvent::MessageReceived(_))
    }

    async fn handle(&self, ctx: &mut HandlerContext<'_>, event: &GatewayEvent) -> Outcome {
        let GatewayEvent::MessageReceived(message) = event else {
            return Outcome::Ignored;
        };
        if message.author.is_bot {
            return Outcome::Ignored;
        }

        ctx.state.stats_mut().record_message(message.at);
        ctx.flush();

        let bot = ctx.state.bot();
        let Some(hit) = CommandRouter::route(&bot.prefix, &bot.commands, &message.content) else {
            return Outcome::Handled;
        };

        debug!(
            bot_id = %ctx.bot_id(),
            command = %hit.name,
            args = hit.args.len(),
            "Command matched"
        );

        let target = MessageTarget::Channel(message.channel_id.clone());
        match ctx.session.send_text(&target, &hit.response).await {
            Ok(()) => {
                ctx.state.stats_mut().record_command(message.at);
                ctx.flush();
            }
            Err(e) => {
                warn!(
                    bot_id = %ctx.bot_id(),
                    command = %hit.name,
                    error = %e,
                    "Failed to send command response"
                );
            }
        }
        Outcome::Handled
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use botkeeper_core::{Author, InboundMessage, OutboundAction};

    use super::*;
    use crate::handler::test_support::{bot, fixture};

    fn message(content: &str, is_bot: bool) -> GatewayEvent {
        GatewayEvent::MessageReceived(InboundMessage {
            server_id: Some("s1".into()),
            channel_id: "general".into(),
            author: Author {
                id: "u1".into(),
                name: "alice".into(),
                is_bot,
            },
            content: content.into(),
            at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_command_is_answered_in_channel() {
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        MessageHandler.handle(&mut ctx, &message("!PING", false)).await;

        assert_eq!(
            *session.actions.lock(),
            vec![OutboundAction::SendText {
                target: MessageTarget::Channel("general".into()),
                content: "pong".into(),
            }]
        );
        let stats = sink.last().unwrap().statistics;
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.commands_used, 1);
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_command_only_counts_message() {
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        MessageHandler.handle(&mut ctx, &message("!pong", false)).await;

        assert!(session.actions.lock().is_empty());
        let stats = sink.last().unwrap().statistics;
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.commands_used, 0);
    }

    #[tokio::test]
    async fn test_bot_authors_are_ignored() {
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        let outcome = MessageHandler.handle(&mut ctx, &message("!ping", true)).await;

        assert_eq!(outcome, Outcome::Ignored);
        assert!(session.actions.lock().is_empty());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_is_not_counted() {
        let (mut state, session, sink) = fixture(bot());
        *session.fail_sends.lock() = true;
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        MessageHandler.handle(&mut ctx, &message("!ping", false)).await;

        let stats = sink.last().unwrap().statistics;
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.commands_used, 0);
    }
}
