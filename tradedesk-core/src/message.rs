//! Outbound message models.
//!
//! These serialize directly to the platform's message JSON (embeds and
//! component rows), so both the REST client and interaction responses can
//! send them unchanged.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub mod color {
    pub const BLURPLE: u32 = 0x5865F2;
    pub const GREEN: u32 = 0x2ECC71;
    pub const RED: u32 = 0xE74C3C;
    pub const GOLD: u32 = 0xF1C40F;
    pub const BLUE: u32 = 0x3498DB;
    pub const DARK_GRAY: u32 = 0x607D8B;
}

/// Longest embed description the platform accepts, in characters.
pub const DESCRIPTION_LIMIT: usize = 4096;

/// Longest embed field value the platform accepts, in characters.
pub const FIELD_VALUE_LIMIT: usize = 1024;

/// The first `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn clamp(mut text: String, max: usize) -> String {
    let len = truncate_chars(&text, max).len();
    text.truncate(len);
    text
}

/// Embed builder. Descriptions and field values are cut to the platform's
/// limits, since they often carry user-supplied text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl Embed {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: Some(title.into()),
            color: Some(color),
            ..Default::default()
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(clamp(text.into(), DESCRIPTION_LIMIT));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: clamp(value.into(), FIELD_VALUE_LIMIT),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Value of the first field called `name`.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
    pub disabled: bool,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
            disabled: false,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

impl Serialize for Button {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Button", 5)?;
        s.serialize_field("type", &2u8)?;
        s.serialize_field("style", &(self.style as u8))?;
        s.serialize_field("label", &self.label)?;
        s.serialize_field("custom_id", &self.custom_id)?;
        s.serialize_field("disabled", &self.disabled)?;
        s.end()
    }
}

/// A row of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionRow(pub Vec<Button>);

impl Serialize for ActionRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ActionRow", 2)?;
        s.serialize_field("type", &1u8)?;
        s.serialize_field("components", &self.0)?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub components: Vec<ActionRow>,
}

impl Message {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_row(mut self, buttons: Vec<Button>) -> Self {
        self.components.push(ActionRow(buttons));
        self
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.components.iter().flat_map(|row| row.0.iter())
    }

    pub fn button(&self, custom_id: &str) -> Option<&Button> {
        self.buttons().find(|b| b.custom_id == custom_id)
    }

    /// Copy of this message with every button disabled.
    pub fn with_buttons_disabled(&self) -> Self {
        let mut out = self.clone();
        for row in &mut out.components {
            for button in &mut row.0 {
                button.disabled = true;
            }
        }
        out
    }
}

/// How a handler's reply is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A new message answering the interaction.
    New { ephemeral: bool },
    /// Replace the message that carries the pressed control.
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub message: Message,
}

impl Reply {
    pub fn public(message: Message) -> Self {
        Self {
            kind: ReplyKind::New { ephemeral: false },
            message,
        }
    }

    pub fn private(message: Message) -> Self {
        Self {
            kind: ReplyKind::New { ephemeral: true },
            message,
        }
    }

    pub fn update(message: Message) -> Self {
        Self {
            kind: ReplyKind::Update,
            message,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self.kind, ReplyKind::New { ephemeral: true })
    }

    /// Plain-text content of the reply, or empty.
    pub fn text(&self) -> &str {
        self.message.content.as_deref().unwrap_or("")
    }
}
