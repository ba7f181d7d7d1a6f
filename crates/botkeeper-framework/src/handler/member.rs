use async_trait::async_trait;
use tracing::{debug, warn};

use botkeeper_core::{GatewayEvent, MemberJoin, MessageTarget};

use super::{EventHandler, HandlerContext, Outcome};
use crate::template::{Placeholder, TemplateVars};

/// Greets new members and grants the configured auto-role.
#[derive(Debug, Default)]
pub struct MemberJoinedHandler;

impl MemberJoinedHandler {
    fn vars(bot_name: &str, join: &MemberJoin) -> TemplateVars {
        TemplateVars::new()
            .set(Placeholder::User, &join.member_name)
            .set(Placeholder::UserId, &join.member_id)
            .set(Placeholder::ServerName, &join.server.name)
            .set(Placeholder::ServerId, &join.server.id)
            .set(Placeholder::MemberCount, join.server.member_count)
            .set(Placeholder::BotName, bot_name)
    }
}

#[async_trait]
impl EventHandler for MemberJoinedHandler {
    fn name(&self) -> &'static str {
        "member_joined"
    }

    fn check(&self, event: &GatewayEvent) -> bool {
        matches!(event, GatewayEvent::MemberJoined(_))
    }

    async fn handle(&self, ctx: &mut HandlerContext<'_>, event: &GatewayEvent) -> Outcome {
        let GatewayEvent::MemberJoined(join) = event else {
            return Outcome::Ignored;
        };
        ctx.state.stats_mut().touch(join.at);

        let settings = &ctx.state.bot().settings;
        let welcome = settings
            .welcome_message
            .enabled
            .then(|| Self::vars(&ctx.state.bot().name, join).render(&settings.welcome_message.message));
        let role = settings.auto_role.active_role().map(str::to_string);

        if let Some(text) = welcome {
            let target = MessageTarget::Member(join.member_id.clone());
            match ctx.session.send_text(&target, &text).await {
                Ok(()) => debug!(bot_id = %ctx.bot_id(), member_id = %join.member_id, "Sent welcome"),
                Err(e) => warn!(
                    bot_id = %ctx.bot_id(),
                    member_id = %join.member_id,
                    error = %e,
                    "Failed to send welcome message"
                ),
            }
        }

        if let Some(role_id) = role {
            if let Err(e) = ctx
                .session
                .grant_role(&join.server.id, &join.member_id, &role_id)
                .await
            {
                warn!(
                    bot_id = %ctx.bot_id(),
                    member_id = %join.member_id,
                    role_id = %role_id,
                    error = %e,
                    "Failed to grant auto-role"
                );
            }
        }

        ctx.flush();
        Outcome::Handled
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use botkeeper_core::{AutoRole, OutboundAction, ServerInfo, WelcomeMessage};

    use super::*;
    use crate::handler::test_support::{bot, fixture};

    fn joined() -> GatewayEvent {
        GatewayEvent::MemberJoined(MemberJoin {
            server: ServerInfo {
                id: "s1".into(),
                name: "Rustaceans".into(),
                member_count: 7,
            },
            member_id: "m1".into(),
            member_name: "bob".into(),
            at: Utc::now(),
        })
    }

    fn configured(welcome: bool, role: Option<&str>) -> botkeeper_core::Bot {
        let mut bot = bot();
        bot.settings.welcome_message = WelcomeMessage {
            enabled: welcome,
            message: "Hi {user}, you are member #{member_count} of {server_name}".into(),
        };
        bot.settings.auto_role = AutoRole {
            enabled: role.is_some(),
            role_id: role.map(str::to_string),
        };
        bot
    }

    #[tokio::test]
    async fn test_welcome_and_role() {
        let (mut state, session, sink) = fixture(configured(true, Some("r1")));
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        MemberJoinedHandler.handle(&mut ctx, &joined()).await;

        assert_eq!(
            *session.actions.lock(),
            vec![
                OutboundAction::SendText {
                    target: MessageTarget::Member("m1".into()),
                    content: "Hi bob, you are member #7 of Rustaceans".into(),
                },
                OutboundAction::GrantRole {
                    server_id: "s1".into(),
                    member_id: "m1".into(),
                    role_id: "r1".into(),
                },
            ]
        );
        assert!(sink.last().unwrap().statistics.last_active.is_some());
    }

    #[tokio::test]
    async fn test_welcome_disabled_sends_no_text() {
        let (mut state, session, sink) = fixture(configured(false, Some("r1")));
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        MemberJoinedHandler.handle(&mut ctx, &joined()).await;

        let actions = session.actions.lock();
        assert!(
            !actions
                .iter()
                .any(|a| matches!(a, OutboundAction::SendText { .. }))
        );
        assert_eq!(actions.len(), 1);
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let (mut state, session, sink) = fixture(configured(false, None));
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        MemberJoinedHandler.handle(&mut ctx, &joined()).await;

        assert!(session.actions.lock().is_empty());
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn test_role_failure_is_not_fatal() {
        let (mut state, session, sink) = fixture(configured(true, Some("r1")));
        *session.fail_grants.lock() = true;
        let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);

        let outcome = MemberJoinedHandler.handle(&mut ctx, &joined()).await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(session.actions.lock().len(), 1);
        assert_eq!(sink.count(), 1);
    }
}
