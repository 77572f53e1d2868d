//! Ticket transcripts emitted on close.

use chrono::{DateTime, Utc};

use crate::ids::{mention_user, MessageId, UserId};
use crate::message::{color, truncate_chars, Embed};
use crate::ticket::Ticket;

/// Longest transcript body, in characters.
pub const TRANSCRIPT_LIMIT: usize = 4000;

/// One message from a channel's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub author: String,
    pub content: String,
}

/// Join the non-empty messages, oldest first, as `author: content` lines and
/// cut the result to [`TRANSCRIPT_LIMIT`] characters.
pub fn transcript_body(history: &[HistoryMessage]) -> String {
    let mut ordered: Vec<&HistoryMessage> = history.iter().collect();
    ordered.sort_by_key(|m| m.id);

    let full = ordered
        .into_iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| format!("{}: {}", m.author, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&full, TRANSCRIPT_LIMIT).to_string()
}

pub fn transcript_embed(ticket: &Ticket, closer: UserId, body: &str, at: DateTime<Utc>) -> Embed {
    let claimed = ticket
        .claimed
        .map(mention_user)
        .unwrap_or_else(|| "Unclaimed".to_string());

    let mut embed = Embed::new("📜 Ticket Transcript", color::DARK_GRAY)
        .timestamp(at)
        .field("Ticket Owner", mention_user(ticket.owner), false)
        .field("Claimed By", claimed, false)
        .field("Closed By", mention_user(closer), false);
    if !body.is_empty() {
        embed = embed.description(body);
    }
    embed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: u64, author: &str, content: &str) -> HistoryMessage {
        HistoryMessage {
            id: MessageId(id),
            author: author.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_body_is_oldest_first_and_skips_empty() {
        let history = vec![
            msg(3, "bob", "deal"),
            msg(1, "alice", "hello"),
            msg(2, "bot", ""),
        ];
        insta::assert_snapshot!(transcript_body(&history), @r"
        alice: hello
        bob: deal
        ");
    }

    #[test]
    fn test_body_truncates_on_char_boundary() {
        let history = vec![msg(1, "a", &"é".repeat(5000))];
        let body = transcript_body(&history);
        assert_eq!(body.chars().count(), TRANSCRIPT_LIMIT);
        assert!(body.starts_with("a: é"));
    }

    #[test]
    fn test_embed_fields() {
        let ticket = Ticket {
            owner: UserId(1),
            claimed: None,
        };
        let embed = transcript_embed(&ticket, UserId(1), "", Utc::now());
        assert_eq!(embed.field_value("Ticket Owner"), Some("<@1>"));
        assert_eq!(embed.field_value("Claimed By"), Some("Unclaimed"));
        assert_eq!(embed.field_value("Closed By"), Some("<@1>"));
        assert_eq!(embed.description, None);

        let claimed = Ticket {
            owner: UserId(1),
            claimed: Some(UserId(2)),
        };
        let embed = transcript_embed(&claimed, UserId(2), "a: b", Utc::now());
        assert_eq!(embed.field_value("Claimed By"), Some("<@2>"));
        assert_eq!(embed.description.as_deref(), Some("a: b"));
    }
}
