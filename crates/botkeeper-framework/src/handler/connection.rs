use async_trait::async_trait;
use tracing::warn;

use botkeeper_core::{BotStatus, GatewayEvent};

use super::{EventHandler, HandlerContext, Outcome};

/// Marks the bot errored when its session fails.
///
/// The live connection is left in place; it stays registered until stopped.
#[derive(Debug, Default)]
pub struct ConnectionErrorHandler;

#[async_trait]
impl EventHandler for ConnectionErrorHandler {
    fn name(&self) -> &'static str {
        "connection_error"
    }

    fn check(&self, event: &GatewayEvent) -> bool {
        matches!(event, GatewayEvent::ConnectionError { .. })
    }

    async fn handle(&self, ctx: &mut HandlerContext<'_>, event: &GatewayEvent) -> Outcome {
        let GatewayEvent::ConnectionError { reason, .. } = event else {
            return Outcome::Ignored;
        };

        warn!(bot_id = %ctx.bot_id(), reason = %reason, "Gateway connection error");
        ctx.state.stats_mut().touch(event.at());
        ctx.state.set_status(BotStatus::Error);
        ctx.flush();
        Outcome::Handled
    }
}
