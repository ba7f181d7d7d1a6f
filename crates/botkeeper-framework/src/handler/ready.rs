use async_trait::async_trait;
use tracing::info;

use botkeeper_core::{BotStatus, GatewayEvent};

use super::{EventHandler, HandlerContext, Outcome};

/// Marks the bot online and records its server inventory.
#[derive(Debug, Default)]
pub struct ReadyHandler;

#[async_trait]
impl EventHandler for ReadyHandler {
    fn name(&self) -> &'static str {
        "ready"
    }

    fn check(&self, event: &GatewayEvent) -> bool {
        matches!(event, GatewayEvent::Ready { .. })
    }

    async fn handle(&self, ctx: &mut HandlerContext<'_>, event: &GatewayEvent) -> Outcome {
        let GatewayEvent::Ready { servers, at } = event else {
            return Outcome::Ignored;
        };

        let stats = ctx.state.stats_mut();
        stats.replace_servers(servers);
        stats.touch(*at);
        ctx.state.set_status(BotStatus::Online);
        ctx.flush();

        info!(bot_id = %ctx.bot_id(), servers = servers.len(), "Bot is online");
        Outcome::Handled
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use botkeeper_core::ServerInfo;

    use super::*;
    use crate::handler::test_support::{bot, fixture};

    fn ready(ids: &[&str]) -> GatewayEvent {
        GatewayEvent::Ready {
            servers: ids
                .iter()
                .map(|id| ServerInfo {
                    id: id.to_string(),
                    name: format!("Server {id}"),
                    member_count: 1,
                })
                .collect(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ready_sets_online_and_servers() {
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        assert_eq!(ReadyHandler.handle(&mut ctx, &ready(&["s1", "s2"])).await, Outcome::Handled);

        let snapshot = sink.last().unwrap();
        assert_eq!(snapshot.status, BotStatus::Online);
        assert_eq!(snapshot.statistics.servers.len(), 2);
        assert!(snapshot.statistics.last_active.is_some());
    }

    #[tokio::test]
    async fn test_second_ready_replaces_inventory() {
        let (mut state, session, sink) = fixture(bot());
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        ReadyHandler.handle(&mut ctx, &ready(&["s1", "s2"])).await;
        ReadyHandler.handle(&mut ctx, &ready(&["s3"])).await;

        let servers = sink.last().unwrap().statistics.servers;
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].server_id, "s3");
    }
}
