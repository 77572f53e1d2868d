//! Outbound platform operations.
//!
//! The `Platform` trait lists every call the handlers make to the outside
//! world. The server crate implements it over the REST API; [`FakePlatform`]
//! records calls in memory so handlers can be tested without a connection.

mod fake;

pub use fake::{FakePlatform, PlatformCall};

use anyhow::Result;
use async_trait::async_trait;

use crate::ids::{ChannelId, MessageId, RoleId, UserId};
use crate::message::Message;
use crate::transcript::HistoryMessage;

/// Request to provision a private ticket channel.
///
/// The channel is hidden from everyone except `owner` (view, send, attach)
/// and `staff_role` (view only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicketChannel {
    pub name: String,
    pub category: ChannelId,
    pub owner: UserId,
    pub staff_role: RoleId,
}

/// Permissions granted to a single member on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberAccess {
    pub view: bool,
    pub send: bool,
    pub attach: bool,
}

impl MemberAccess {
    /// Read and write, as given to members added to a ticket.
    pub const PARTICIPANT: MemberAccess = MemberAccess {
        view: true,
        send: true,
        attach: false,
    };

    /// Read, write and upload, as given to the owner and the claiming middleman.
    pub const HANDLER: MemberAccess = MemberAccess {
        view: true,
        send: true,
        attach: true,
    };
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Whether a channel or category with this id exists in the guild.
    async fn channel_exists(&self, channel: ChannelId) -> Result<bool>;

    async fn create_ticket_channel(&self, request: &NewTicketChannel) -> Result<ChannelId>;

    async fn set_member_access(
        &self,
        channel: ChannelId,
        user: UserId,
        access: MemberAccess,
    ) -> Result<()>;

    async fn send_message(&self, channel: ChannelId, message: &Message) -> Result<MessageId>;

    /// Message history of a channel. Order is not guaranteed. Implementations
    /// may return a partial history when a later read fails.
    async fn channel_history(&self, channel: ChannelId) -> Result<Vec<HistoryMessage>>;

    async fn delete_channel(&self, channel: ChannelId) -> Result<()>;

    async fn add_role(&self, user: UserId, role: RoleId) -> Result<()>;

    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<()>;

    async fn ban(&self, user: UserId, reason: &str) -> Result<()>;

    async fn unban(&self, user: UserId, reason: &str) -> Result<()>;

    /// Display name of any user, including ones no longer in the guild.
    async fn fetch_user_name(&self, user: UserId) -> Result<String>;

    /// Fails when the user does not accept direct messages.
    async fn send_direct_message(&self, user: UserId, message: &Message) -> Result<()>;

    /// Rewrite the message created as the response to an interaction.
    async fn edit_original_response(&self, interaction_token: &str, message: &Message)
        -> Result<()>;
}
