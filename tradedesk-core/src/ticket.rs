//! Ticket lifecycle state machine.
//!
//! A ticket moves `OpenUnclaimed -> Claimed -> Closed`. Closed tickets are not
//! represented: closing removes the record, so presence in the map means
//! "open". The functions here are pure over the ticket map; channel
//! provisioning, permission changes and persistence are done by the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};
use crate::ids::{ChannelId, UserId};
use crate::permissions::{is_middleman, Actor};
use crate::settings::GuildSettings;

/// Open tickets, keyed by the ticket channel.
pub type TicketMap = BTreeMap<ChannelId, Ticket>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub owner: UserId,
    pub claimed: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    OpenUnclaimed,
    Claimed { by: UserId },
}

impl Ticket {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            claimed: None,
        }
    }

    pub fn state(&self) -> TicketState {
        match self.claimed {
            None => TicketState::OpenUnclaimed,
            Some(by) => TicketState::Claimed { by },
        }
    }

    /// Whether `actor` may close this ticket: the claimer or the current owner.
    pub fn may_close(&self, actor: UserId) -> bool {
        self.owner == actor || self.claimed == Some(actor)
    }
}

/// Look up an open ticket.
pub fn open_ticket(tickets: &TicketMap, channel: ChannelId) -> BotResult<&Ticket> {
    tickets.get(&channel).ok_or(BotError::NotATicket)
}

/// Record a freshly provisioned ticket channel.
pub fn open(tickets: &mut TicketMap, channel: ChannelId, owner: UserId) -> &Ticket {
    tickets.entry(channel).or_insert_with(|| Ticket::new(owner))
}

/// Claim a ticket for `actor`.
///
/// Checks run in a fixed order so that every attempt after the first
/// successful claim reports `AlreadyClaimed`, whether or not the later actor
/// holds the middleman role.
pub fn claim(
    tickets: &mut TicketMap,
    channel: ChannelId,
    actor: &Actor,
    settings: &GuildSettings,
) -> BotResult<Ticket> {
    let ticket = tickets.get_mut(&channel).ok_or(BotError::NotATicket)?;

    if ticket.claimed.is_some() {
        return Err(BotError::AlreadyClaimed);
    }

    if !is_middleman(actor, settings) {
        return Err(BotError::NotAuthorized(
            "Only Verified Middlemen can claim this ticket.".to_string(),
        ));
    }

    ticket.claimed = Some(actor.id);
    Ok(ticket.clone())
}

/// Hand the ticket to a new owner, returning the previous one.
pub fn transfer(
    tickets: &mut TicketMap,
    channel: ChannelId,
    new_owner: UserId,
) -> BotResult<UserId> {
    let ticket = tickets.get_mut(&channel).ok_or(BotError::NotATicket)?;
    Ok(std::mem::replace(&mut ticket.owner, new_owner))
}

/// Check that `actor` may close the ticket in `channel`, returning a snapshot
/// of it for the transcript.
pub fn authorize_close(tickets: &TicketMap, channel: ChannelId, actor: &Actor) -> BotResult<Ticket> {
    let ticket = open_ticket(tickets, channel)?;
    if !ticket.may_close(actor.id) {
        return Err(BotError::NotAuthorized(
            "Only the claiming middleman or the ticket owner can close this ticket.".to_string(),
        ));
    }
    Ok(ticket.clone())
}

/// Remove a ticket, moving it to the terminal state.
pub fn close(tickets: &mut TicketMap, channel: ChannelId) -> BotResult<Ticket> {
    tickets.remove(&channel).ok_or(BotError::NotATicket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RoleId;
    use proptest::prelude::*;

    const MM_ROLE: RoleId = RoleId(500);

    fn settings() -> GuildSettings {
        GuildSettings {
            tickets_category: Some(ChannelId(1)),
            transcript_channel: None,
            vouch_channel: None,
            info_log_channel: None,
            ban_log_channel: None,
            middleman_role: MM_ROLE,
            manager_role: RoleId(600),
            info_role: RoleId(700),
        }
    }

    fn middleman(id: u64) -> Actor {
        Actor::new(UserId(id), format!("mm{}", id), vec![MM_ROLE])
    }

    fn member(id: u64) -> Actor {
        Actor::new(UserId(id), format!("user{}", id), vec![])
    }

    #[test]
    fn test_open_creates_unclaimed_ticket() {
        let mut tickets = TicketMap::new();
        let ticket = open(&mut tickets, ChannelId(5), UserId(1)).clone();
        assert_eq!(ticket, Ticket::new(UserId(1)));
        assert_eq!(ticket.state(), TicketState::OpenUnclaimed);
        assert_eq!(tickets.len(), 1);
    }

    #[test]
    fn test_claim_by_middleman() {
        let mut tickets = TicketMap::new();
        open(&mut tickets, ChannelId(5), UserId(1));

        let claimed = claim(&mut tickets, ChannelId(5), &middleman(2), &settings()).unwrap();
        assert_eq!(claimed.state(), TicketState::Claimed { by: UserId(2) });
        assert_eq!(tickets[&ChannelId(5)].claimed, Some(UserId(2)));
    }

    #[test]
    fn test_claim_rejects_non_middleman() {
        let mut tickets = TicketMap::new();
        open(&mut tickets, ChannelId(5), UserId(1));

        let err = claim(&mut tickets, ChannelId(5), &member(3), &settings()).unwrap_err();
        assert!(matches!(err, BotError::NotAuthorized(_)));
        assert_eq!(tickets[&ChannelId(5)].claimed, None);
    }

    #[test]
    fn test_second_claim_fails_already_claimed() {
        let mut tickets = TicketMap::new();
        open(&mut tickets, ChannelId(5), UserId(1));
        claim(&mut tickets, ChannelId(5), &middleman(2), &settings()).unwrap();

        let err = claim(&mut tickets, ChannelId(5), &middleman(4), &settings()).unwrap_err();
        assert!(matches!(err, BotError::AlreadyClaimed));

        // Unauthorized actors also see AlreadyClaimed once the ticket is taken.
        let err = claim(&mut tickets, ChannelId(5), &member(3), &settings()).unwrap_err();
        assert!(matches!(err, BotError::AlreadyClaimed));
        assert_eq!(tickets[&ChannelId(5)].claimed, Some(UserId(2)));
    }

    #[test]
    fn test_claim_untracked_channel() {
        let mut tickets = TicketMap::new();
        let err = claim(&mut tickets, ChannelId(5), &middleman(2), &settings()).unwrap_err();
        assert!(matches!(err, BotError::NotATicket));
    }

    #[test]
    fn test_transfer_changes_owner_only() {
        let mut tickets = TicketMap::new();
        open(&mut tickets, ChannelId(5), UserId(1));
        claim(&mut tickets, ChannelId(5), &middleman(2), &settings()).unwrap();

        let previous = transfer(&mut tickets, ChannelId(5), UserId(9)).unwrap();
        assert_eq!(previous, UserId(1));
        assert_eq!(tickets[&ChannelId(5)].owner, UserId(9));
        assert_eq!(tickets[&ChannelId(5)].claimed, Some(UserId(2)));

        assert!(matches!(
            transfer(&mut tickets, ChannelId(6), UserId(9)),
            Err(BotError::NotATicket)
        ));
    }

    #[test]
    fn test_close_authorization() {
        let mut tickets = TicketMap::new();
        open(&mut tickets, ChannelId(5), UserId(1));
        claim(&mut tickets, ChannelId(5), &middleman(2), &settings()).unwrap();

        assert!(authorize_close(&tickets, ChannelId(5), &member(1)).is_ok());
        assert!(authorize_close(&tickets, ChannelId(5), &middleman(2)).is_ok());
        // A different middleman is neither claimer nor owner.
        assert!(matches!(
            authorize_close(&tickets, ChannelId(5), &middleman(4)),
            Err(BotError::NotAuthorized(_))
        ));
        assert!(matches!(
            authorize_close(&tickets, ChannelId(5), &member(3)),
            Err(BotError::NotAuthorized(_))
        ));
    }

    #[test]
    fn test_close_twice_fails_not_a_ticket() {
        let mut tickets = TicketMap::new();
        open(&mut tickets, ChannelId(5), UserId(1));

        let closed = close(&mut tickets, ChannelId(5)).unwrap();
        assert_eq!(closed.owner, UserId(1));
        assert!(tickets.is_empty());
        assert!(matches!(close(&mut tickets, ChannelId(5)), Err(BotError::NotATicket)));
        assert!(matches!(
            authorize_close(&tickets, ChannelId(5), &member(1)),
            Err(BotError::NotATicket)
        ));
    }

    proptest! {
        /// Property: across any sequence of claim attempts at most one
        /// succeeds, and it is the first attempt made by a middleman.
        #[test]
        fn first_authorized_claim_wins(
            attempts in prop::collection::vec((1u64..20, any::<bool>()), 1..30)
        ) {
            let s = settings();
            let mut tickets = TicketMap::new();
            open(&mut tickets, ChannelId(5), UserId(100));

            let expected = attempts.iter().find(|(_, mm)| *mm).map(|(id, _)| UserId(*id));
            let mut successes = 0;
            let mut seen_success = false;

            for (id, mm) in &attempts {
                let actor = if *mm { middleman(*id) } else { member(*id) };
                match claim(&mut tickets, ChannelId(5), &actor, &s) {
                    Ok(_) => {
                        successes += 1;
                        seen_success = true;
                    }
                    Err(BotError::AlreadyClaimed) => prop_assert!(seen_success),
                    Err(BotError::NotAuthorized(_)) => {
                        prop_assert!(!seen_success);
                        prop_assert!(!*mm);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }

            prop_assert!(successes <= 1);
            prop_assert_eq!(tickets[&ChannelId(5)].claimed, expected);
        }
    }
}
