//! Component (button) custom ids.
//!
//! Controls on messages that were posted before a restart must keep working,
//! so every button carries all the routing information it needs in its
//! custom id. Parsing a custom id back into a [`ComponentAction`] is the whole
//! registry: nothing has to be re-registered per message at startup.

use std::fmt;
use std::str::FromStr;

use crate::ids::{InteractionId, UserId};
use crate::trade::TradeSlot;

pub const OPEN_TICKET: &str = "persistent:open_ticket";
pub const CLAIM_TICKET: &str = "persistent:claim_ticket";
pub const CLOSE_TICKET: &str = "persistent:close_ticket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationAnswer {
    Accept,
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    OpenTicket,
    ClaimTicket,
    CloseTicket,
    /// A trader confirming their side of a trade.
    TradeConfirm {
        session: InteractionId,
        slot: TradeSlot,
    },
    /// Answer to a role invitation. `issued_at` is a unix timestamp in seconds.
    Invitation {
        answer: InvitationAnswer,
        target: UserId,
        staff: UserId,
        issued_at: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownComponent(pub String);

impl fmt::Display for UnknownComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown component id {:?}", self.0)
    }
}

impl std::error::Error for UnknownComponent {}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentAction::OpenTicket => f.write_str(OPEN_TICKET),
            ComponentAction::ClaimTicket => f.write_str(CLAIM_TICKET),
            ComponentAction::CloseTicket => f.write_str(CLOSE_TICKET),
            ComponentAction::TradeConfirm { session, slot } => {
                write!(f, "trade:{}:{}", session, slot.number())
            }
            ComponentAction::Invitation {
                answer,
                target,
                staff,
                issued_at,
            } => {
                let answer = match answer {
                    InvitationAnswer::Accept => "accept",
                    InvitationAnswer::Decline => "decline",
                };
                write!(f, "info:{}:{}:{}:{}", answer, target, staff, issued_at)
            }
        }
    }
}

impl FromStr for ComponentAction {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownComponent(s.to_string());

        match s {
            OPEN_TICKET => return Ok(ComponentAction::OpenTicket),
            CLAIM_TICKET => return Ok(ComponentAction::ClaimTicket),
            CLOSE_TICKET => return Ok(ComponentAction::CloseTicket),
            _ => {}
        }

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["trade", session, slot] => {
                let session = session.parse().map_err(|_| unknown())?;
                let slot = match *slot {
                    "1" => TradeSlot::First,
                    "2" => TradeSlot::Second,
                    _ => return Err(unknown()),
                };
                Ok(ComponentAction::TradeConfirm { session, slot })
            }
            ["info", answer, target, staff, issued_at] => {
                let answer = match *answer {
                    "accept" => InvitationAnswer::Accept,
                    "decline" => InvitationAnswer::Decline,
                    _ => return Err(unknown()),
                };
                Ok(ComponentAction::Invitation {
                    answer,
                    target: target.parse().map_err(|_| unknown())?,
                    staff: staff.parse().map_err(|_| unknown())?,
                    issued_at: issued_at.parse().map_err(|_| unknown())?,
                })
            }
            _ => Err(unknown()),
        }
    }
}
