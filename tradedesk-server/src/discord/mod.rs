//! REST client for the platform API, implementing [`Platform`].

mod middleware;

pub use middleware::{CorrelationId, TracingMiddleware, CORRELATION_ID_HEADER};

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use tradedesk_core::platform::{MemberAccess, NewTicketChannel, Platform};
use tradedesk_core::transcript::HistoryMessage;
use tradedesk_core::{ChannelId, Message, MessageId, RoleId, UserId};

use crate::commands::CommandDefinition;

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// How many times a rate-limited request is retried before giving up.
const MAX_RATE_LIMIT_RETRIES: usize = 3;

/// Upper bound on a single rate-limit wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Page size for channel history requests; the API maximum.
const HISTORY_PAGE: usize = 100;

const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;
const ATTACH_FILES: u64 = 1 << 15;

const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;

const GUILD_TEXT: u8 = 0;

#[derive(Clone)]
pub struct DiscordClient {
    client: ClientWithMiddleware,
    api_base: String,
    token: String,
    application_id: u64,
    guild_id: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct PermissionOverwrite {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

#[derive(Debug, Serialize)]
struct CreateChannelRequest {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    parent_id: String,
    permission_overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Serialize)]
struct EditPermissionsRequest {
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

#[derive(Debug, Serialize)]
struct CreateDmRequest {
    recipient_id: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: ApiUser,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    username: String,
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RateLimited {
    /// Seconds to wait before retrying.
    retry_after: f64,
}

fn permission_bits(access: MemberAccess) -> u64 {
    let mut bits = 0;
    if access.view {
        bits |= VIEW_CHANNEL;
    }
    if access.send {
        bits |= SEND_MESSAGES;
    }
    if access.attach {
        bits |= ATTACH_FILES;
    }
    bits
}

/// Overwrites for a new ticket: hidden from `@everyone` (whose role id is the
/// guild id), fully open to the owner and readable by staff.
fn ticket_overwrites(request: &NewTicketChannel, guild_id: u64) -> Vec<PermissionOverwrite> {
    vec![
        PermissionOverwrite {
            id: guild_id.to_string(),
            kind: OVERWRITE_ROLE,
            allow: "0".to_string(),
            deny: VIEW_CHANNEL.to_string(),
        },
        PermissionOverwrite {
            id: request.owner.to_string(),
            kind: OVERWRITE_MEMBER,
            allow: permission_bits(MemberAccess::HANDLER).to_string(),
            deny: "0".to_string(),
        },
        PermissionOverwrite {
            id: request.staff_role.to_string(),
            kind: OVERWRITE_ROLE,
            allow: VIEW_CHANNEL.to_string(),
            deny: "0".to_string(),
        },
    ]
}

/// Audit log reasons travel in a header, so only printable ASCII survives.
fn audit_reason(reason: &str) -> String {
    reason
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}

fn parse_id(raw: &str, what: &str) -> Result<u64> {
    raw.parse::<u64>()
        .with_context(|| format!("Invalid {} id in response: {}", what, raw))
}

/// How long a 429 response asks us to wait, capped at [`MAX_RETRY_AFTER`].
fn retry_delay(body: &str) -> Option<Duration> {
    let limited: RateLimited = serde_json::from_str(body).ok()?;
    if !limited.retry_after.is_finite() || limited.retry_after < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(limited.retry_after).min(MAX_RETRY_AFTER))
}

impl TryFrom<ApiMessage> for HistoryMessage {
    type Error = anyhow::Error;

    fn try_from(message: ApiMessage) -> Result<Self> {
        Ok(HistoryMessage {
            id: MessageId(parse_id(&message.id, "message")?),
            author: message.author.username,
            content: message.content,
        })
    }
}

/// Convert a history page, dropping entries whose id cannot be ordered.
fn history_from_page(page: Vec<ApiMessage>) -> Vec<HistoryMessage> {
    page.into_iter()
        .filter_map(|message| match HistoryMessage::try_from(message) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping history entry: {:#}", e);
                None
            }
        })
        .collect()
}

impl DiscordClient {
    pub fn new(token: String, application_id: u64, guild_id: u64) -> Result<Self> {
        let client = create_discord_client()?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            application_id,
            guild_id,
        })
    }

    /// Point the client at another API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bot {}", self.token))
    }

    /// Send a request and fail on any non-success status, surfacing the
    /// API's own error message. Rate-limited requests are retried after the
    /// delay the API asks for, up to [`MAX_RATE_LIMIT_RETRIES`] times.
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let builder = self.authorized(builder);
        let mut attempt = 0;
        loop {
            let request = builder
                .try_clone()
                .with_context(|| format!("Failed to build {} request", what))?;
            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to send {} request", what))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RATE_LIMIT_RETRIES {
                if let Some(delay) = retry_delay(&error_text) {
                    attempt += 1;
                    warn!(
                        "Rate limited during {}, retrying in {:?} (attempt {})",
                        what, delay, attempt
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            error!("Discord API error during {}: {} - {}", what, status, error_text);
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.message)
                .unwrap_or_else(|_| format!("{} - {}", status, error_text));
            return Err(anyhow!(message));
        }
    }

    fn json_body<T: Serialize>(builder: RequestBuilder, body: &T) -> Result<RequestBuilder> {
        Ok(builder
            .body(serde_json::to_string(body)?)
            .header("Content-Type", "application/json"))
    }

    /// Replace the guild's slash commands with `commands`.
    pub async fn register_commands(&self, commands: &[CommandDefinition]) -> Result<()> {
        let url = format!(
            "{}/applications/{}/guilds/{}/commands",
            self.api_base, self.application_id, self.guild_id
        );
        let builder = Self::json_body(self.client.put(&url), &commands)?;
        self.send(builder, "command registration").await?;
        info!("Registered {} slash commands", commands.len());
        Ok(())
    }

    async fn history_page(
        &self,
        channel: ChannelId,
        before: Option<&str>,
    ) -> Result<Vec<ApiMessage>> {
        let mut url = format!(
            "{}/channels/{}/messages?limit={}",
            self.api_base, channel, HISTORY_PAGE
        );
        if let Some(before) = before {
            url.push_str(&format!("&before={}", before));
        }
        self.send(self.client.get(&url), "channel history")
            .await?
            .json()
            .await
            .context("Failed to parse channel history")
    }

    async fn create_dm_channel(&self, user: UserId) -> Result<ChannelId> {
        let url = format!("{}/users/@me/channels", self.api_base);
        let request = CreateDmRequest {
            recipient_id: user.to_string(),
        };
        let builder = Self::json_body(self.client.post(&url), &request)?;
        let response: IdResponse = self
            .send(builder, "DM channel")
            .await?
            .json()
            .await
            .context("Failed to parse DM channel response")?;
        Ok(ChannelId(parse_id(&response.id, "channel")?))
    }
}

#[async_trait]
impl Platform for DiscordClient {
    async fn channel_exists(&self, channel: ChannelId) -> Result<bool> {
        let url = format!("{}/channels/{}", self.api_base, channel);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .context("Failed to send channel lookup request")?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(anyhow!("Channel lookup failed: {}", status)),
        }
    }

    async fn create_ticket_channel(&self, request: &NewTicketChannel) -> Result<ChannelId> {
        let url = format!("{}/guilds/{}/channels", self.api_base, self.guild_id);
        let body = CreateChannelRequest {
            name: request.name.clone(),
            kind: GUILD_TEXT,
            parent_id: request.category.to_string(),
            permission_overwrites: ticket_overwrites(request, self.guild_id),
        };
        let builder = Self::json_body(self.client.post(&url), &body)?;
        let created: IdResponse = self
            .send(builder, "channel creation")
            .await?
            .json()
            .await
            .context("Failed to parse created channel")?;
        let channel = ChannelId(parse_id(&created.id, "channel")?);
        info!("Created ticket channel {} ({})", request.name, channel);
        Ok(channel)
    }

    async fn set_member_access(
        &self,
        channel: ChannelId,
        user: UserId,
        access: MemberAccess,
    ) -> Result<()> {
        let url = format!("{}/channels/{}/permissions/{}", self.api_base, channel, user);
        let body = EditPermissionsRequest {
            kind: OVERWRITE_MEMBER,
            allow: permission_bits(access).to_string(),
            deny: "0".to_string(),
        };
        let builder = Self::json_body(self.client.put(&url), &body)?;
        self.send(builder, "permission overwrite").await?;
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, message: &Message) -> Result<MessageId> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel);
        let builder = Self::json_body(self.client.post(&url), message)?;
        let sent: IdResponse = self
            .send(builder, "message")
            .await?
            .json()
            .await
            .context("Failed to parse sent message")?;
        Ok(MessageId(parse_id(&sent.id, "message")?))
    }

    async fn channel_history(&self, channel: ChannelId) -> Result<Vec<HistoryMessage>> {
        let mut history = Vec::new();
        let mut before: Option<String> = None;
        loop {
            let page = match self.history_page(channel, before.as_deref()).await {
                Ok(page) => page,
                // Nothing read yet: let the caller decide.
                Err(e) if before.is_none() => return Err(e),
                Err(e) => {
                    warn!(
                        "History of {} cut short after {} messages: {:#}",
                        channel,
                        history.len(),
                        e
                    );
                    break;
                }
            };
            let exhausted = page.len() < HISTORY_PAGE;
            // Pages come newest first; the last entry is the cursor for the next one.
            before = page.last().map(|m| m.id.clone());
            history.extend(history_from_page(page));
            if exhausted || before.is_none() {
                break;
            }
        }
        Ok(history)
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<()> {
        let url = format!("{}/channels/{}", self.api_base, channel);
        self.send(self.client.delete(&url), "channel deletion").await?;
        info!("Deleted channel {}", channel);
        Ok(())
    }

    async fn add_role(&self, user: UserId, role: RoleId) -> Result<()> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base, self.guild_id, user, role
        );
        self.send(self.client.put(&url), "role add").await?;
        Ok(())
    }

    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<()> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base, self.guild_id, user, role
        );
        self.send(self.client.delete(&url), "role removal").await?;
        Ok(())
    }

    async fn ban(&self, user: UserId, reason: &str) -> Result<()> {
        let url = format!("{}/guilds/{}/bans/{}", self.api_base, self.guild_id, user);
        let builder = self
            .client
            .put(&url)
            .header("X-Audit-Log-Reason", audit_reason(reason))
            .header("Content-Type", "application/json")
            .body("{}");
        self.send(builder, "ban").await?;
        Ok(())
    }

    async fn unban(&self, user: UserId, reason: &str) -> Result<()> {
        let url = format!("{}/guilds/{}/bans/{}", self.api_base, self.guild_id, user);
        let builder = self
            .client
            .delete(&url)
            .header("X-Audit-Log-Reason", audit_reason(reason));
        self.send(builder, "unban").await?;
        Ok(())
    }

    async fn fetch_user_name(&self, user: UserId) -> Result<String> {
        let url = format!("{}/users/{}", self.api_base, user);
        let profile: ApiUser = self
            .send(self.client.get(&url), "user lookup")
            .await?
            .json()
            .await
            .context("Failed to parse user")?;
        Ok(profile.global_name.unwrap_or(profile.username))
    }

    async fn send_direct_message(&self, user: UserId, message: &Message) -> Result<()> {
        let channel = self.create_dm_channel(user).await?;
        self.send_message(channel, message).await?;
        Ok(())
    }

    async fn edit_original_response(
        &self,
        interaction_token: &str,
        message: &Message,
    ) -> Result<()> {
        let url = format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.api_base, self.application_id, interaction_token
        );
        let builder = Self::json_body(self.client.patch(&url), message)?;
        self.send(builder, "response edit").await?;
        Ok(())
    }
}

pub fn create_discord_client() -> Result<ClientWithMiddleware> {
    use reqwest_middleware::ClientBuilder;

    let client = Client::builder()
        .user_agent(format!(
            "DiscordBot (tradedesk, {})",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .context("Failed to create HTTP client")?;

    Ok(ClientBuilder::new(client).with(TracingMiddleware).build())
}
