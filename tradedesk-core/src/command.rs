//! Argument parsing for the administrative slash commands.

use std::fmt;

use crate::error::{BotError, BotResult};
use crate::ids::UserId;

/// What `managerole` should do with the role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
    Add,
    Remove,
}

/// What `manageban` should do with the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanAction {
    Ban,
    Unban,
}

impl fmt::Display for RoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleAction::Add => write!(f, "add"),
            RoleAction::Remove => write!(f, "remove"),
        }
    }
}

impl fmt::Display for BanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BanAction::Ban => write!(f, "ban"),
            BanAction::Unban => write!(f, "unban"),
        }
    }
}

/// Parse the `action` option of `managerole`, case-insensitively.
pub fn parse_role_action(action: &str) -> BotResult<RoleAction> {
    match action.trim().to_lowercase().as_str() {
        "add" => Ok(RoleAction::Add),
        "remove" => Ok(RoleAction::Remove),
        _ => Err(BotError::InvalidInput(
            "Action must be 'add' or 'remove'.".to_string(),
        )),
    }
}

/// Parse the `action` option of `manageban`, case-insensitively.
pub fn parse_ban_action(action: &str) -> BotResult<BanAction> {
    match action.trim().to_lowercase().as_str() {
        "ban" => Ok(BanAction::Ban),
        "unban" => Ok(BanAction::Unban),
        _ => Err(BotError::InvalidInput(
            "Action must be 'ban' or 'unban'.".to_string(),
        )),
    }
}

/// Parse a user given either as a raw id or in mention syntax.
///
/// Accepts `123`, `<@123>` and `<@!123>`. Mention punctuation (`<@`, `!`,
/// `&`, `>`) is stripped wherever it appears before parsing; anything that is
/// then not a plain unsigned integer is rejected.
pub fn parse_user_reference(input: &str) -> BotResult<UserId> {
    let stripped: String = input
        .trim()
        .replace("<@", "")
        .chars()
        .filter(|c| !matches!(c, '>' | '!' | '&'))
        .collect();

    stripped
        .parse::<u64>()
        .map(UserId)
        .map_err(|_| BotError::InvalidInput("Invalid User ID or mention provided.".to_string()))
}
