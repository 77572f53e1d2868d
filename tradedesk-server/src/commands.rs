//! Slash command catalogue, registered with the platform at startup.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

const OPTION_STRING: u8 = 3;
const OPTION_USER: u8 = 6;
const OPTION_ROLE: u8 = 8;

/// A slash command the bot answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    Rules,
    SetupTicket,
    Info,
    Faq,
    Tos,
    Vouch,
    Stats,
    Add,
    Transfer,
    Close,
    ManageRole,
    ManageBan,
    Confirm,
}

/// Registration payload for one command.
#[derive(Debug, Serialize)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
}

#[derive(Debug, Serialize)]
pub struct OptionDefinition {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

fn user_option(name: &'static str, description: &'static str) -> OptionDefinition {
    OptionDefinition {
        kind: OPTION_USER,
        name,
        description,
        required: true,
    }
}

fn string_option(name: &'static str, description: &'static str) -> OptionDefinition {
    OptionDefinition {
        kind: OPTION_STRING,
        name,
        description,
        required: true,
    }
}

impl SlashCommand {
    pub const ALL: [SlashCommand; 13] = [
        SlashCommand::Rules,
        SlashCommand::SetupTicket,
        SlashCommand::Info,
        SlashCommand::Faq,
        SlashCommand::Tos,
        SlashCommand::Vouch,
        SlashCommand::Stats,
        SlashCommand::Add,
        SlashCommand::Transfer,
        SlashCommand::Close,
        SlashCommand::ManageRole,
        SlashCommand::ManageBan,
        SlashCommand::Confirm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SlashCommand::Rules => "rules",
            SlashCommand::SetupTicket => "setupticket",
            SlashCommand::Info => "info",
            SlashCommand::Faq => "faq",
            SlashCommand::Tos => "tos",
            SlashCommand::Vouch => "vouch",
            SlashCommand::Stats => "stats",
            SlashCommand::Add => "add",
            SlashCommand::Transfer => "transfer",
            SlashCommand::Close => "close",
            SlashCommand::ManageRole => "managerole",
            SlashCommand::ManageBan => "manageban",
            SlashCommand::Confirm => "confirm",
        }
    }

    pub fn definition(self) -> CommandDefinition {
        let (description, options) = match self {
            SlashCommand::Rules => ("Show the server rules", vec![]),
            SlashCommand::SetupTicket => ("Post the ticket panel in this channel", vec![]),
            SlashCommand::Info => (
                "Invite a member to the invitation role",
                vec![user_option("user", "Member to invite")],
            ),
            SlashCommand::Faq => ("Show frequently asked questions", vec![]),
            SlashCommand::Tos => ("Show the middleman terms of service", vec![]),
            SlashCommand::Vouch => (
                "Vouch for a member",
                vec![
                    user_option("user", "Member to vouch for"),
                    string_option("reason", "Why you are vouching"),
                ],
            ),
            SlashCommand::Stats => (
                "Show a member's vouches",
                vec![user_option("user", "Member to look up")],
            ),
            SlashCommand::Add => (
                "Add a member to this ticket",
                vec![user_option("user", "Member to add")],
            ),
            SlashCommand::Transfer => (
                "Transfer ownership of this ticket",
                vec![user_option("user", "New owner")],
            ),
            SlashCommand::Close => ("Close this ticket", vec![]),
            SlashCommand::ManageRole => (
                "Add or remove a role from a member",
                vec![
                    user_option("user", "Target member"),
                    OptionDefinition {
                        kind: OPTION_ROLE,
                        name: "role",
                        description: "Role to change",
                        required: true,
                    },
                    string_option("action", "add or remove"),
                ],
            ),
            SlashCommand::ManageBan => (
                "Ban or unban a user by id or mention",
                vec![
                    string_option("user", "User id or mention"),
                    string_option("action", "ban or unban"),
                ],
            ),
            SlashCommand::Confirm => (
                "Ask two traders to confirm a trade",
                vec![
                    user_option("trader1", "First trader"),
                    user_option("trader2", "Second trader"),
                    string_option("trade_info", "What is being traded"),
                ],
            ),
        };
        CommandDefinition {
            name: self.name(),
            description,
            options,
        }
    }
}

impl fmt::Display for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for SlashCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlashCommand::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

pub fn command_definitions() -> Vec<CommandDefinition> {
    SlashCommand::ALL.into_iter().map(SlashCommand::definition).collect()
}
