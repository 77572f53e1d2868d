//! Routes decoded interactions to [`Bot`] handlers.
//!
//! Every handler error stops here: it is logged and turned into a private
//! reply for the member who triggered the interaction.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info};

use tradedesk_core::{
    Actor, Bot, BotError, BotResult, ChannelId, ComponentAction, Reply, RoleId, RoleRef, UserId,
};

use crate::commands::SlashCommand;
use crate::interaction::{
    Interaction, InteractionData, InteractionResponse, INTERACTION_COMMAND, INTERACTION_COMPONENT,
    INTERACTION_PING,
};

pub async fn dispatch(bot: &Arc<Bot>, interaction: &Interaction) -> InteractionResponse {
    let result = match interaction.kind {
        INTERACTION_PING => return InteractionResponse::pong(),
        INTERACTION_COMMAND => handle_command(bot, interaction).await,
        INTERACTION_COMPONENT => handle_component(bot, interaction).await,
        other => Err(BotError::InvalidInput(format!(
            "Unsupported interaction type {}.",
            other
        ))),
    };

    match result {
        Ok(reply) => reply.into(),
        Err(e) => {
            match &e {
                BotError::Platform(cause) => {
                    error!("Interaction {} failed: {:#}", interaction.id, cause)
                }
                other => debug!("Interaction {} rejected: {}", interaction.id, other),
            }
            InteractionResponse::error(e.user_message())
        }
    }
}

fn invalid(why: &str) -> BotError {
    BotError::InvalidInput(why.to_string())
}

fn actor(interaction: &Interaction) -> BotResult<Actor> {
    interaction
        .actor()
        .ok_or_else(|| invalid("Interaction has no user."))
}

fn data(interaction: &Interaction) -> BotResult<&InteractionData> {
    interaction
        .data
        .as_ref()
        .ok_or_else(|| invalid("Interaction has no data."))
}

/// Channel the interaction came from. Ticket actions outside a channel
/// cannot address a ticket.
fn channel(interaction: &Interaction) -> BotResult<ChannelId> {
    interaction.channel_id.ok_or(BotError::NotATicket)
}

fn string_option<'a>(data: &'a InteractionData, name: &str) -> BotResult<&'a str> {
    data.option(name)
        .and_then(Value::as_str)
        .ok_or_else(|| BotError::InvalidInput(format!("Missing option `{}`.", name)))
}

/// A snowflake-valued option. Ids arrive as strings.
fn id_option(data: &InteractionData, name: &str) -> BotResult<u64> {
    string_option(data, name)?
        .parse()
        .map_err(|_| BotError::InvalidInput(format!("Option `{}` is not a valid id.", name)))
}

fn user_option(data: &InteractionData, name: &str) -> BotResult<UserId> {
    id_option(data, name).map(UserId)
}

fn member_option(data: &InteractionData, name: &str) -> BotResult<Actor> {
    let user = user_option(data, name)?;
    data.resolved_member(user)
        .ok_or_else(|| invalid("That user could not be found."))
}

async fn handle_command(bot: &Arc<Bot>, interaction: &Interaction) -> BotResult<Reply> {
    let actor = actor(interaction)?;
    let data = data(interaction)?;
    let name = data.name.as_deref().unwrap_or_default();
    let command: SlashCommand = name
        .parse()
        .map_err(|_| BotError::InvalidInput(format!("Unknown command `{}`.", name)))?;
    info!("/{} from {}", command, actor.id);

    match command {
        SlashCommand::Rules => Ok(bot.rules()),
        SlashCommand::Faq => Ok(bot.faq()),
        SlashCommand::Tos => Ok(bot.tos()),
        SlashCommand::SetupTicket => bot.setup_ticket(&actor, channel(interaction)?).await,
        SlashCommand::Info => {
            let target = member_option(data, "user")?;
            bot.invite(&actor, &target, Utc::now().timestamp()).await
        }
        SlashCommand::Vouch => {
            let target = member_option(data, "user")?;
            let reason = string_option(data, "reason")?;
            bot.vouch(&actor, &target, reason).await
        }
        SlashCommand::Stats => {
            let target = member_option(data, "user")?;
            bot.stats(&target).await
        }
        SlashCommand::Add => {
            let user = user_option(data, "user")?;
            bot.add_member(channel(interaction)?, user).await
        }
        SlashCommand::Transfer => {
            let user = user_option(data, "user")?;
            bot.transfer_ticket(channel(interaction)?, user).await
        }
        SlashCommand::Close => close(bot, &actor, channel(interaction)?).await,
        SlashCommand::ManageRole => {
            let user = user_option(data, "user")?;
            let role_id = RoleId(id_option(data, "role")?);
            let role = data
                .resolved_role(role_id)
                .map(|r| RoleRef {
                    id: r.id,
                    name: r.name.clone(),
                })
                .ok_or_else(|| invalid("That role could not be found."))?;
            let action = string_option(data, "action")?;
            bot.manage_role(&actor, user, &role, action).await
        }
        SlashCommand::ManageBan => {
            let user = string_option(data, "user")?;
            let action = string_option(data, "action")?;
            bot.manage_ban(&actor, user, action).await
        }
        SlashCommand::Confirm => {
            let trader1 = user_option(data, "trader1")?;
            let trader2 = user_option(data, "trader2")?;
            let trade_info = string_option(data, "trade_info")?;
            Ok(bot
                .start_trade(
                    interaction.id,
                    &interaction.token,
                    trader1,
                    trader2,
                    trade_info,
                )
                .await)
        }
    }
}

async fn handle_component(bot: &Arc<Bot>, interaction: &Interaction) -> BotResult<Reply> {
    let actor = actor(interaction)?;
    let custom_id = data(interaction)?
        .custom_id
        .as_deref()
        .ok_or_else(|| invalid("Component has no id."))?;
    let action: ComponentAction = custom_id
        .parse()
        .map_err(|e| BotError::InvalidInput(format!("Unrecognised control: {}", e)))?;
    debug!("Component {} pressed by {}", custom_id, actor.id);

    match action {
        ComponentAction::OpenTicket => bot.open_ticket(&actor).await,
        ComponentAction::ClaimTicket => bot.claim_ticket(&actor, channel(interaction)?).await,
        ComponentAction::CloseTicket => close(bot, &actor, channel(interaction)?).await,
        ComponentAction::TradeConfirm { session, slot } => {
            bot.press_trade(&actor, session, slot).await
        }
        ComponentAction::Invitation {
            answer,
            target,
            staff,
            issued_at,
        } => {
            bot.answer_invitation(
                &actor,
                answer,
                target,
                staff,
                issued_at,
                Utc::now().timestamp(),
            )
            .await
        }
    }
}

/// Acknowledge a close now and carry it out in the background, so the
/// acknowledgement reaches the channel before it is archived and deleted.
async fn close(bot: &Arc<Bot>, actor: &Actor, channel: ChannelId) -> BotResult<Reply> {
    let (reply, pending) = bot.begin_close(actor, channel).await?;
    let bot = bot.clone();
    tokio::spawn(async move {
        bot.finish_close(pending).await;
    });
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tradedesk_core::platform::PlatformCall;
    use tradedesk_core::{FakePlatform, GuildSettings, Store, StorePaths};

    const CATEGORY: ChannelId = ChannelId(1);
    const MM_ROLE: u64 = 50;
    const MANAGER_ROLE: u64 = 60;

    fn bot_with(platform: Arc<FakePlatform>, name: &str) -> Arc<Bot> {
        let dir = std::env::temp_dir().join(format!(
            "tradedesk_dispatch_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let settings = GuildSettings {
            tickets_category: Some(CATEGORY),
            transcript_channel: Some(ChannelId(2)),
            vouch_channel: None,
            info_log_channel: None,
            ban_log_channel: None,
            middleman_role: RoleId(MM_ROLE),
            manager_role: RoleId(MANAGER_ROLE),
            info_role: RoleId(70),
        };
        Arc::new(
            Bot::new(settings, Store::empty(StorePaths::in_dir(&dir)), platform)
                .with_close_grace(Duration::ZERO),
        )
    }

    fn member(id: u64, roles: &[u64]) -> Value {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        json!({
            "user": {"id": id.to_string(), "username": format!("user{}", id), "global_name": null},
            "roles": roles,
            "nick": null
        })
    }

    fn command(id: u64, from: Value, channel: u64, data: Value) -> Interaction {
        serde_json::from_value(json!({
            "id": id.to_string(),
            "type": 2,
            "token": format!("token-{}", id),
            "channel_id": channel.to_string(),
            "member": from,
            "data": data
        }))
        .unwrap()
    }

    fn press(from: Value, channel: u64, custom_id: &str) -> Interaction {
        serde_json::from_value(json!({
            "id": "1",
            "type": 3,
            "token": "component-token",
            "channel_id": channel.to_string(),
            "member": from,
            "data": {"custom_id": custom_id}
        }))
        .unwrap()
    }

    fn content(response: &InteractionResponse) -> &str {
        response
            .data
            .as_ref()
            .and_then(|d| d.message.content.as_deref())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_ping_is_answered_with_pong() {
        let bot = bot_with(Arc::new(FakePlatform::new()), "ping");
        let ping: Interaction =
            serde_json::from_value(json!({"id": "1", "type": 1, "token": "t"})).unwrap();
        assert_eq!(dispatch(&bot, &ping).await, InteractionResponse::pong());
    }

    #[tokio::test]
    async fn test_rules_is_public() {
        let bot = bot_with(Arc::new(FakePlatform::new()), "rules");
        let response = dispatch(&bot, &command(5, member(1, &[]), 9, json!({"name": "rules"}))).await;
        assert_eq!(response.kind, 4);
        assert_eq!(response.data.as_ref().unwrap().flags, None);
    }

    #[tokio::test]
    async fn test_errors_become_private_replies() {
        let bot = bot_with(Arc::new(FakePlatform::new()), "errors");
        let response = dispatch(
            &bot,
            &command(
                5,
                member(1, &[]),
                9,
                json!({
                    "name": "manageban",
                    "options": [
                        {"name": "user", "type": 3, "value": "123"},
                        {"name": "action", "type": 3, "value": "ban"}
                    ]
                }),
            ),
        )
        .await;
        assert_eq!(response.data.as_ref().unwrap().flags, Some(64));
        assert_eq!(content(&response), "❌ Only Managers can use this command.");

        let response = dispatch(&bot, &command(6, member(1, &[]), 9, json!({"name": "dance"}))).await;
        assert_eq!(content(&response), "❌ Unknown command `dance`.");
    }

    #[tokio::test]
    async fn test_manageban_from_mention() {
        let platform = Arc::new(FakePlatform::new());
        let bot = bot_with(platform.clone(), "manageban");
        let response = dispatch(
            &bot,
            &command(
                5,
                member(1, &[MANAGER_ROLE]),
                9,
                json!({
                    "name": "manageban",
                    "options": [
                        {"name": "user", "type": 3, "value": "<@123>"},
                        {"name": "action", "type": 3, "value": "ban"}
                    ]
                }),
            ),
        )
        .await;
        assert_eq!(content(&response), "✅ User ID `123` has been banned.");
        assert!(platform
            .calls()
            .contains(&PlatformCall::Ban(UserId(123), "Banned by user1".to_string())));
    }

    #[tokio::test]
    async fn test_confirm_then_press_both_controls() {
        let bot = bot_with(Arc::new(FakePlatform::new()), "confirm");
        let started = dispatch(
            &bot,
            &command(
                77,
                member(1, &[]),
                9,
                json!({
                    "name": "confirm",
                    "options": [
                        {"name": "trader1", "type": 6, "value": "11"},
                        {"name": "trader2", "type": 6, "value": "12"},
                        {"name": "trade_info", "type": 3, "value": "pet for pet"}
                    ]
                }),
            ),
        )
        .await;
        assert_eq!(content(&started), "<@11> <@12>");

        let wrong = dispatch(&bot, &press(member(12, &[]), 9, "trade:77:1")).await;
        assert_eq!(content(&wrong), "❌ Only Trader 1 can click this button!");

        let first = dispatch(&bot, &press(member(11, &[]), 9, "trade:77:1")).await;
        assert_eq!(first.kind, 7);
        let second = dispatch(&bot, &press(member(12, &[]), 9, "trade:77:2")).await;
        let message = &second.data.as_ref().unwrap().message;
        assert_eq!(message.embeds[0].title.as_deref(), Some("✅ Trade Confirmed"));

        let late = dispatch(&bot, &press(member(12, &[]), 9, "trade:77:2")).await;
        assert_eq!(content(&late), "⌛ This trade confirmation has expired.");
    }

    #[tokio::test]
    async fn test_open_claim_and_close_through_controls() {
        let platform = Arc::new(FakePlatform::new().with_channel(CATEGORY));
        let bot = bot_with(platform.clone(), "controls");

        let opened = dispatch(&bot, &press(member(100, &[]), 9, "persistent:open_ticket")).await;
        assert_eq!(opened.data.as_ref().unwrap().flags, Some(64));
        let ticket_channel = platform
            .calls()
            .iter()
            .find_map(|call| match call {
                PlatformCall::SendMessage { channel, .. } => Some(*channel),
                _ => None,
            })
            .unwrap();

        let claimed = dispatch(
            &bot,
            &press(member(200, &[MM_ROLE]), ticket_channel.get(), "persistent:claim_ticket"),
        )
        .await;
        assert_eq!(claimed.kind, 7);

        let closing = dispatch(
            &bot,
            &press(member(100, &[]), ticket_channel.get(), "persistent:close_ticket"),
        )
        .await;
        assert_eq!(
            content(&closing),
            "⌛ Archiving chat and closing channel in 0s..."
        );

        // The close finishes on a spawned task.
        for _ in 0..100 {
            if platform
                .calls()
                .contains(&PlatformCall::DeleteChannel(ticket_channel))
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(platform
            .calls()
            .contains(&PlatformCall::DeleteChannel(ticket_channel)));
        assert_eq!(bot.ticket(ticket_channel).await, None);
    }

    #[tokio::test]
    async fn test_unknown_control_is_rejected() {
        let bot = bot_with(Arc::new(FakePlatform::new()), "unknown");
        let response = dispatch(&bot, &press(member(1, &[]), 9, "persistent:launch")).await;
        assert!(content(&response).starts_with("❌ Unrecognised control"));
    }
}
