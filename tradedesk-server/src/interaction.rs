//! Inbound interaction payloads and the responses sent back for them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tradedesk_core::message::ReplyKind;
use tradedesk_core::{Actor, ChannelId, InteractionId, Message, Reply, RoleId, UserId};

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_COMMAND: u8 = 2;
pub const INTERACTION_COMPONENT: u8 = 3;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const RESPONSE_UPDATE_MESSAGE: u8 = 7;

const FLAG_EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Deserialize, Clone)]
pub struct Interaction {
    pub id: InteractionId,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    pub channel_id: Option<ChannelId>,
    pub member: Option<GuildMember>,
    pub user: Option<User>,
    pub data: Option<InteractionData>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuildMember {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    pub nick: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub global_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InteractionData {
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    pub resolved: Option<Resolved>,
    pub custom_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommandOption {
    pub name: String,
    pub value: Option<Value>,
}

/// Users, members and roles referenced by command options.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Resolved {
    #[serde(default)]
    pub users: HashMap<UserId, User>,
    #[serde(default)]
    pub members: HashMap<UserId, PartialMember>,
    #[serde(default)]
    pub roles: HashMap<RoleId, ResolvedRole>,
}

/// A resolved member; the user object is carried separately in `users`.
#[derive(Debug, Deserialize, Clone)]
pub struct PartialMember {
    #[serde(default)]
    pub roles: Vec<RoleId>,
    pub nick: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolvedRole {
    pub id: RoleId,
    pub name: String,
}

impl User {
    /// Name shown in embeds: global display name, falling back to the username.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

impl Interaction {
    /// The member who triggered the interaction.
    ///
    /// Direct-message interactions carry `user` instead of `member` and have
    /// no roles.
    pub fn actor(&self) -> Option<Actor> {
        match (&self.member, &self.user) {
            (Some(member), _) => Some(Actor::new(
                member.user.id,
                member.user.username.clone(),
                member.roles.clone(),
            )),
            (None, Some(user)) => Some(Actor::new(user.id, user.username.clone(), vec![])),
            (None, None) => None,
        }
    }
}

impl InteractionData {
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
    }

    /// A resolved user option as an [`Actor`], with the roles and display
    /// name the member has in the guild.
    pub fn resolved_member(&self, user: UserId) -> Option<Actor> {
        let resolved = self.resolved.as_ref()?;
        let profile = resolved.users.get(&user)?;
        let member = resolved.members.get(&user);
        let name = member
            .and_then(|m| m.nick.clone())
            .unwrap_or_else(|| profile.display_name().to_string());
        let roles = member.map(|m| m.roles.clone()).unwrap_or_default();
        Some(Actor::new(user, name, roles))
    }

    pub fn resolved_role(&self, role: RoleId) -> Option<&ResolvedRole> {
        self.resolved.as_ref()?.roles.get(&role)
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ResponseData {
    #[serde(flatten)]
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Reply::private(Message::text(text)).into()
    }
}

impl From<Reply> for InteractionResponse {
    fn from(reply: Reply) -> Self {
        let (kind, flags) = match reply.kind {
            ReplyKind::New { ephemeral: true } => (RESPONSE_CHANNEL_MESSAGE, Some(FLAG_EPHEMERAL)),
            ReplyKind::New { ephemeral: false } => (RESPONSE_CHANNEL_MESSAGE, None),
            ReplyKind::Update => (RESPONSE_UPDATE_MESSAGE, None),
        };
        Self {
            kind,
            data: Some(ResponseData {
                message: reply.message,
                flags,
            }),
        }
    }
}
