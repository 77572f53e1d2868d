//! Text and layout of the bot's messages.

use chrono::{DateTime, Utc};

use crate::component::{ComponentAction, InvitationAnswer, CLAIM_TICKET, CLOSE_TICKET, OPEN_TICKET};
use crate::ids::{mention_role, mention_user, RoleId, UserId};
use crate::message::{color, Button, ButtonStyle, Embed, Message};
use crate::vouch::VouchStats;

const SERVICE_TITLE: &str = "🔐 Trusted Middleman Service";

const SERVICE_BODY: &str = "✅ Staff-Handled Trades\n\n\
    • Your trade is handled by a verified middleman from the staff team\n\
    • Keep all trade communication inside the ticket\n\n\
    📌 Please provide:\n\
    • Trade details\n\
    • User involved\n\
    • Proof/screenshots\n\n";

pub fn rules() -> Message {
    Message::embed(
        Embed::new("📚 Server Rules", color::BLURPLE).description(
            "Be Respectful\nNo Spam or Self-Promotion\nKeep Content Appropriate\n\
             Use the Correct Channels\nNo Illegal Activities\nRespect Privacy\n\
             No Impersonation\nFollow Discord ToS\nListen to Staff\nNo Death Threats\n\
             No Toxicity Beyond a Joke\nBe Supportive\nHave Fun & Be Kind\n\
             Middleman Fees $3 MM fee, $1.50 cancel fee",
        ),
    )
}

pub fn faq() -> Message {
    Message::embed(
        Embed::new("📌 Frequently Asked Questions", color::BLURPLE).description(
            "Q1: How do I get a role?\nA: Roles are assigned based on activity, applications, or commands.\n\n\
             Q2: How do I report someone?\nA: Open a ticket to file a report.\n\n\
             Q3: Why was my message deleted?\nA: It may have violated a server rule.\n\n\
             Q4: Can I advertise my server?\nA: Only in designated channels with permission.",
        ),
    )
}

pub fn tos() -> Message {
    Message::embed(
        Embed::new("📋 Middleman Terms of Service", color::BLURPLE).description(
            "🚫 No Refunds Once Confirmed\n📸 Proof May Be Required\n⚖️ No Illegal Items\n\
             🛡️ Scams and Disputes Are Handled by Staff\n💰 Fees",
        ),
    )
}

/// Panel with the button that opens a ticket, posted by `setupticket`.
pub fn ticket_panel() -> Message {
    Message::embed(
        Embed::new(SERVICE_TITLE, color::BLURPLE)
            .description(format!("{}⬇️ Request a middleman here.", SERVICE_BODY)),
    )
    .with_row(vec![Button::new(
        OPEN_TICKET,
        "🎫 Open Ticket",
        ButtonStyle::Primary,
    )])
}

/// First message inside a ticket channel. Once claimed it names the claimer
/// and the claim control is disabled.
pub fn ticket_entry_panel(claimed_by: Option<UserId>) -> Message {
    let mut embed = Embed::new(SERVICE_TITLE, color::BLURPLE).description(format!(
        "{}⬇️ A middleman will claim your ticket shortly.",
        SERVICE_BODY
    ));

    let claim = match claimed_by {
        None => Button::new(CLAIM_TICKET, "🛡️ Claim", ButtonStyle::Success),
        Some(claimer) => {
            embed = embed.field("Claimed By", mention_user(claimer), false);
            Button::new(CLAIM_TICKET, "✅ Claimed", ButtonStyle::Secondary).disabled(true)
        }
    };

    Message::embed(embed).with_row(vec![
        claim,
        Button::new(CLOSE_TICKET, "🔒 Close", ButtonStyle::Danger),
    ])
}

pub fn vouch_summary(
    voucher: UserId,
    target: UserId,
    reason: &str,
    total: u64,
    at: DateTime<Utc>,
) -> Message {
    Message::embed(
        Embed::new("📝 New Vouch", color::GREEN)
            .description(format!(
                "**Voucher:** {}\n**Vouched User:** {}\n**Reason:** {}\n**Total Vouches:** {}",
                mention_user(voucher),
                mention_user(target),
                reason,
                total
            ))
            .timestamp(at),
    )
}

pub fn vouch_stats(target_name: &str, stats: &VouchStats) -> Message {
    let description: String = stats
        .recent
        .iter()
        .map(|v| format!("**{}:** {}\n", mention_user(v.voucher), v.reason))
        .collect();
    Message::embed(
        Embed::new(format!("📝 Vouch Stats for {}", target_name), color::BLUE)
            .description(description)
            .footer(format!("Total Vouches: {}", stats.total)),
    )
}

pub fn invitation(target: UserId, staff: UserId, role: RoleId, issued_at: i64) -> Message {
    let button = |answer: InvitationAnswer, label: &str, style: ButtonStyle| {
        let id = ComponentAction::Invitation {
            answer,
            target,
            staff,
            issued_at,
        };
        Button::new(id.to_string(), label, style)
    };

    Message::embed(
        Embed::new("📨 Role Invitation", color::GOLD).description(format!(
            "{} has invited {} to join {}.\n\n\
             Do you accept this invitation?\n\n\
             ⏳ You have 1 minute to respond.",
            mention_user(staff),
            mention_user(target),
            mention_role(role)
        )),
    )
    .with_content(mention_user(target))
    .with_row(vec![
        button(InvitationAnswer::Accept, "Accept", ButtonStyle::Success),
        button(InvitationAnswer::Decline, "Decline", ButtonStyle::Danger),
    ])
}

/// Direct message sent to a member who accepted an invitation.
pub fn invitation_welcome(role: RoleId, at: DateTime<Utc>) -> Message {
    Message::embed(
        Embed::new("👋 Welcome", color::GOLD)
            .description(format!(
                "You now hold the {} role. Read the guide channels to get started, \
                 and open a ticket if you need help from staff.",
                mention_role(role)
            ))
            .timestamp(at),
    )
}

pub fn invitation_log(target: UserId, staff: UserId, accepted: bool, at: DateTime<Utc>) -> Message {
    let (status, color) = if accepted {
        ("Accepted", color::GREEN)
    } else {
        ("Declined", color::RED)
    };
    Message::embed(
        Embed::new("Info Command Used", color)
            .description(format!(
                "**User:** {}\n**Staff:** {}\n**Status:** {}",
                mention_user(target),
                mention_user(staff),
                status
            ))
            .timestamp(at),
    )
}

pub fn ban_log(
    banned: bool,
    target_name: &str,
    target: UserId,
    staff: UserId,
    at: DateTime<Utc>,
) -> Message {
    let embed = if banned {
        Embed::new("🛡️ Member Banned", color::RED)
    } else {
        Embed::new("🔓 Member Unbanned", color::GREEN)
    };
    Message::embed(
        embed
            .timestamp(at)
            .field("Target User", target_name, true)
            .field("User ID", format!("`{}`", target), true)
            .field("Staff Member", mention_user(staff), false)
            .footer("Ban Management System"),
    )
}
