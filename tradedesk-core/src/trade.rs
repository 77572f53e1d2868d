//! Two-party trade confirmation.
//!
//! Each confirmation is bound to a single posted message. Its state lives in
//! a [`TradeTable`] keyed by the id of the command interaction that created
//! the message, and is dropped on dual confirmation or when the time-to-live
//! runs out. Time is always passed in, so the transitions stay pure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::component::ComponentAction;
use crate::error::{BotError, BotResult};
use crate::ids::{mention_user, InteractionId, UserId};
use crate::message::{color, Button, ButtonStyle, Embed, Message};

pub const TRADE_TTL: Duration = Duration::from_secs(300);

const FOOTER: &str = "Powered by Trading Portal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeSlot {
    First,
    Second,
}

impl TradeSlot {
    pub fn number(self) -> u8 {
        match self {
            TradeSlot::First => 1,
            TradeSlot::Second => 2,
        }
    }

    fn index(self) -> usize {
        usize::from(self.number() - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeStatus {
    /// Participants who have not confirmed yet, in slot order.
    Awaiting(Vec<UserId>),
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct TradeConfirmation {
    session: InteractionId,
    traders: [UserId; 2],
    info: String,
    confirmed: [bool; 2],
    expires_at: Instant,
    /// Token of the creating interaction, used to rewrite the message on expiry.
    token: String,
}

impl TradeConfirmation {
    pub fn new(
        session: InteractionId,
        trader1: UserId,
        trader2: UserId,
        info: impl Into<String>,
        token: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            session,
            traders: [trader1, trader2],
            info: info.into(),
            confirmed: [false, false],
            expires_at: now + TRADE_TTL,
            token: token.into(),
        }
    }

    pub fn trader(&self, slot: TradeSlot) -> UserId {
        self.traders[slot.index()]
    }

    pub fn is_confirmed(&self, slot: TradeSlot) -> bool {
        self.confirmed[slot.index()]
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn status(&self) -> TradeStatus {
        let awaiting: Vec<UserId> = [TradeSlot::First, TradeSlot::Second]
            .into_iter()
            .filter(|slot| !self.is_confirmed(*slot))
            .map(|slot| self.trader(slot))
            .collect();
        if awaiting.is_empty() {
            TradeStatus::Confirmed
        } else {
            TradeStatus::Awaiting(awaiting)
        }
    }

    /// Record a press of `slot`'s control by `actor`.
    ///
    /// Only the designated participant may set a slot's flag; anyone else is
    /// rejected without touching state. Flags never revert.
    pub fn press(&mut self, actor: UserId, slot: TradeSlot) -> BotResult<TradeStatus> {
        if actor != self.trader(slot) {
            return Err(BotError::NotAuthorized(format!(
                "Only Trader {} can click this button!",
                slot.number()
            )));
        }
        self.confirmed[slot.index()] = true;
        Ok(self.status())
    }

    /// The message as it should currently be displayed.
    pub fn render(&self) -> Message {
        let trader1 = mention_user(self.traders[0]);
        let trader2 = mention_user(self.traders[1]);

        match self.status() {
            TradeStatus::Confirmed => {
                let embed = Embed::new("✅ Trade Confirmed", color::GREEN)
                    .description(
                        "Both traders have confirmed this trade. Please proceed with the rest of the trade.",
                    )
                    .field("🧑 Trader 1", trader1, true)
                    .field("🧑 Trader 2", trader2, true)
                    .field("✅ Status", "Both traders confirmed", false)
                    .footer(FOOTER);
                Message::embed(embed)
                    .with_row(self.buttons())
                    .with_buttons_disabled()
            }
            TradeStatus::Awaiting(pending) => {
                let awaiting = pending
                    .iter()
                    .map(|id| format!("🔴 {}", mention_user(*id)))
                    .collect::<Vec<_>>()
                    .join("\n");
                let embed = Embed::new("✅ Trade Confirmation", color::GREEN)
                    .description(
                        "In order to continue this trade, both traders should confirm the trade.",
                    )
                    .field("📊 Trade Information", self.info.clone(), false)
                    .field("🧑 Trader 1", trader1, true)
                    .field("🧑 Trader 2", trader2, true)
                    .field("⏳ Awaiting Confirmation", awaiting, false)
                    .footer(FOOTER);
                Message::embed(embed).with_row(self.buttons())
            }
        }
    }

    fn buttons(&self) -> Vec<Button> {
        [TradeSlot::First, TradeSlot::Second]
            .into_iter()
            .map(|slot| {
                let id = ComponentAction::TradeConfirm {
                    session: self.session,
                    slot,
                };
                Button::new(
                    id.to_string(),
                    format!("✅ Confirm Trade (Trader {})", slot.number()),
                    ButtonStyle::Success,
                )
                .disabled(self.is_confirmed(slot))
            })
            .collect()
    }
}

/// A confirmation that timed out, with what is needed to disable its controls.
#[derive(Debug, Clone)]
pub struct ExpiredTrade {
    pub session: InteractionId,
    pub token: String,
    pub message: Message,
}

/// Live trade confirmations keyed by session.
#[derive(Debug, Default)]
pub struct TradeTable {
    entries: HashMap<InteractionId, TradeConfirmation>,
}

impl TradeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, session: InteractionId) -> Option<&TradeConfirmation> {
        self.entries.get(&session)
    }

    /// Register a new confirmation and return its initial message.
    pub fn start(&mut self, trade: TradeConfirmation) -> Message {
        let message = trade.render().with_content(format!(
            "{} {}",
            mention_user(trade.traders[0]),
            mention_user(trade.traders[1])
        ));
        self.entries.insert(trade.session, trade);
        message
    }

    /// Apply a control press and return the rewritten message.
    ///
    /// Expired entries are dropped on access. Confirmed entries are dropped
    /// once the terminal message has been produced.
    pub fn press(
        &mut self,
        session: InteractionId,
        actor: UserId,
        slot: TradeSlot,
        now: Instant,
    ) -> BotResult<Message> {
        let expired = match self.entries.get(&session) {
            None => return Err(BotError::Expired("trade confirmation")),
            Some(trade) => trade.is_expired(now),
        };
        if expired {
            self.entries.remove(&session);
            return Err(BotError::Expired("trade confirmation"));
        }

        let trade = self
            .entries
            .get_mut(&session)
            .ok_or(BotError::Expired("trade confirmation"))?;
        let status = trade.press(actor, slot)?;
        let message = trade.render();

        if status == TradeStatus::Confirmed {
            self.entries.remove(&session);
        }
        Ok(message)
    }

    /// Remove every expired confirmation.
    pub fn sweep(&mut self, now: Instant) -> Vec<ExpiredTrade> {
        let expired: Vec<InteractionId> = self
            .entries
            .iter()
            .filter(|(_, trade)| trade.is_expired(now))
            .map(|(session, _)| *session)
            .collect();

        expired
            .into_iter()
            .filter_map(|session| self.entries.remove(&session))
            .map(|trade| ExpiredTrade {
                session: trade.session,
                message: trade.render().with_buttons_disabled(),
                token: trade.token,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const P1: UserId = UserId(1);
    const P2: UserId = UserId(2);
    const SESSION: InteractionId = InteractionId(500);

    fn table_with_trade(now: Instant) -> TradeTable {
        let mut table = TradeTable::new();
        table.start(TradeConfirmation::new(SESSION, P1, P2, "swap", "tok", now));
        table
    }

    fn awaiting_field(message: &Message) -> Option<String> {
        message.embeds[0]
            .field_value("⏳ Awaiting Confirmation")
            .map(str::to_string)
    }

    #[test]
    fn test_long_trade_info_fits_in_field() {
        let info = "x".repeat(5000);
        let mut table = TradeTable::new();
        let message = table.start(TradeConfirmation::new(
            SESSION,
            P1,
            P2,
            &info,
            "tok",
            Instant::now(),
        ));
        let shown = message.embeds[0].field_value("📊 Trade Information").unwrap();
        assert_eq!(shown.chars().count(), crate::message::FIELD_VALUE_LIMIT);
    }

    #[test]
    fn test_confirm_scenario() {
        let now = Instant::now();
        let mut table = TradeTable::new();
        let initial = table.start(TradeConfirmation::new(SESSION, P1, P2, "swap", "tok", now));

        assert_eq!(initial.content.as_deref(), Some("<@1> <@2>"));
        assert!(initial.buttons().all(|b| !b.disabled));
        assert_eq!(awaiting_field(&initial).as_deref(), Some("🔴 <@1>\n🔴 <@2>"));

        let after_p1 = table.press(SESSION, P1, TradeSlot::First, now).unwrap();
        assert_eq!(awaiting_field(&after_p1).as_deref(), Some("🔴 <@2>"));
        assert!(after_p1.button("trade:500:1").unwrap().disabled);
        assert!(!after_p1.button("trade:500:2").unwrap().disabled);

        let done = table.press(SESSION, P2, TradeSlot::Second, now).unwrap();
        assert_eq!(done.embeds[0].title.as_deref(), Some("✅ Trade Confirmed"));
        assert!(done.buttons().all(|b| b.disabled));
        assert!(table.is_empty());
    }

    #[test]
    fn test_wrong_actor_is_rejected_without_change() {
        let now = Instant::now();
        let mut table = table_with_trade(now);

        let err = table.press(SESSION, P2, TradeSlot::First, now).unwrap_err();
        assert!(matches!(err, BotError::NotAuthorized(ref m) if m == "Only Trader 1 can click this button!"));
        let err = table.press(SESSION, UserId(3), TradeSlot::Second, now).unwrap_err();
        assert!(matches!(err, BotError::NotAuthorized(_)));

        let trade = table.get(SESSION).unwrap();
        assert_eq!(trade.status(), TradeStatus::Awaiting(vec![P1, P2]));
    }

    #[test]
    fn test_press_after_ttl_expires() {
        let now = Instant::now();
        let mut table = table_with_trade(now);

        let later = now + TRADE_TTL;
        let err = table.press(SESSION, P1, TradeSlot::First, later).unwrap_err();
        assert!(matches!(err, BotError::Expired(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unknown_session_is_expired() {
        let mut table = TradeTable::new();
        let err = table
            .press(InteractionId(1), P1, TradeSlot::First, Instant::now())
            .unwrap_err();
        assert!(matches!(err, BotError::Expired(_)));
    }

    #[test]
    fn test_sweep_disables_controls_without_confirming() {
        let now = Instant::now();
        let mut table = table_with_trade(now);
        table.press(SESSION, P1, TradeSlot::First, now).unwrap();

        assert!(table.sweep(now + Duration::from_secs(10)).is_empty());

        let expired = table.sweep(now + TRADE_TTL + Duration::from_secs(1));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].token, "tok");
        assert!(expired[0].message.buttons().all(|b| b.disabled));
        // Still shows who never confirmed.
        assert_eq!(awaiting_field(&expired[0].message).as_deref(), Some("🔴 <@2>"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_same_user_in_both_slots() {
        let now = Instant::now();
        let mut trade = TradeConfirmation::new(SESSION, P1, P1, "self", "tok", now);
        assert_eq!(trade.press(P1, TradeSlot::First).unwrap(), TradeStatus::Awaiting(vec![P1]));
        assert_eq!(trade.press(P1, TradeSlot::Second).unwrap(), TradeStatus::Confirmed);
    }

    proptest! {
        /// Property: the trade is confirmed iff each designated trader pressed
        /// their own control; other presses never change state.
        #[test]
        fn confirmed_iff_both_designated_presses(
            presses in prop::collection::vec((1u64..5, any::<bool>()), 0..20)
        ) {
            let now = Instant::now();
            let mut trade = TradeConfirmation::new(SESSION, P1, P2, "x", "tok", now);
            let mut p1_pressed = false;
            let mut p2_pressed = false;

            for (actor, first) in &presses {
                let slot = if *first { TradeSlot::First } else { TradeSlot::Second };
                let before = trade.status();
                let result = trade.press(UserId(*actor), slot);
                let designated = UserId(*actor) == trade.trader(slot);
                if designated {
                    prop_assert!(result.is_ok());
                    match slot {
                        TradeSlot::First => p1_pressed = true,
                        TradeSlot::Second => p2_pressed = true,
                    }
                } else {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(trade.status(), before);
                }
            }

            prop_assert_eq!(trade.status() == TradeStatus::Confirmed, p1_pressed && p2_pressed);
        }
    }
}
