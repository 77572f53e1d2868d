//! Handler-level error taxonomy.
//!
//! Every variant is caught at the dispatch boundary and turned into a private
//! reply via [`BotError::user_message`]; none of them terminate the process.

use thiserror::Error;

use crate::ids::UserId;

#[derive(Debug, Error)]
pub enum BotError {
    /// A required channel, category or role is not configured or no longer exists.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The actor lacks the required role or identity. The payload is the
    /// user-facing explanation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The action targets a channel that is not a tracked, open ticket.
    #[error("channel is not an active ticket")]
    NotATicket,

    #[error("ticket is already claimed")]
    AlreadyClaimed,

    /// Stats were requested for a user nobody has vouched for.
    #[error("no vouches recorded for {0}")]
    NoRecord(UserId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The target of a role invitation already holds the role.
    #[error("user {0} already has the role")]
    AlreadyHasRole(UserId),

    /// The interactive workflow behind a control has timed out.
    #[error("{0} has expired")]
    Expired(&'static str),

    /// A collaborator call (REST, channel provisioning, ...) failed.
    #[error(transparent)]
    Platform(#[from] anyhow::Error),
}

impl BotError {
    /// Text shown to the actor whose action failed.
    pub fn user_message(&self) -> String {
        match self {
            BotError::Configuration(what) => format!("❌ {} configuration missing.", what),
            BotError::NotAuthorized(why) => format!("❌ {}", why),
            BotError::NotATicket => "❌ This is not an active ticket channel.".to_string(),
            BotError::AlreadyClaimed => "❌ This ticket is already claimed.".to_string(),
            BotError::NoRecord(user) => format!("❌ <@{}> has no vouches recorded.", user),
            BotError::InvalidInput(why) => format!("❌ {}", why),
            BotError::AlreadyHasRole(user) => format!("❌ <@{}> already has this role.", user),
            BotError::Expired(what) => format!("⌛ This {} has expired.", what),
            BotError::Platform(e) => format!("❌ Error: {}", e),
        }
    }
}

pub type BotResult<T> = Result<T, BotError>;
