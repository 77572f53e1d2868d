//! Interaction handlers.
//!
//! `Bot` owns the store, the live trade table and a handle to the platform,
//! and exposes one method per command or control. Handlers return a
//! [`Reply`] for the interaction; failures come back as [`BotError`] for the
//! caller to turn into a private message.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::command::{parse_ban_action, parse_role_action, parse_user_reference, BanAction, RoleAction};
use crate::component::InvitationAnswer;
use crate::content;
use crate::error::{BotError, BotResult};
use crate::ids::{mention_channel, mention_role, mention_user, ChannelId, InteractionId, RoleId, UserId};
use crate::message::{Message, Reply};
use crate::permissions::{has_role, is_manager, is_middleman, Actor};
use crate::platform::{MemberAccess, NewTicketChannel, Platform};
use crate::settings::GuildSettings;
use crate::store::Store;
use crate::ticket::{self, Ticket};
use crate::trade::{TradeConfirmation, TradeSlot, TradeTable};
use crate::transcript::{transcript_body, transcript_embed};
use crate::vouch;

/// Delay between acknowledging a close and deleting the channel.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// How long a role invitation can be answered, in seconds.
pub const INVITATION_TTL_SECS: i64 = 60;

/// A role named in a command option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
}

/// A close that has been authorized and acknowledged but not yet carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending close does nothing until passed to Bot::finish_close"]
pub struct PendingClose {
    pub channel: ChannelId,
    pub ticket: Ticket,
    pub closer: UserId,
}

pub struct Bot {
    settings: GuildSettings,
    store: Mutex<Store>,
    trades: Mutex<TradeTable>,
    /// Ticket channels whose close sequence is in flight.
    closing: Mutex<HashSet<ChannelId>>,
    platform: Arc<dyn Platform>,
    close_grace: Duration,
}

impl Bot {
    pub fn new(settings: GuildSettings, store: Store, platform: Arc<dyn Platform>) -> Self {
        Self {
            settings,
            store: Mutex::new(store),
            trades: Mutex::new(TradeTable::new()),
            closing: Mutex::new(HashSet::new()),
            platform,
            close_grace: CLOSE_GRACE,
        }
    }

    /// Override the delay before a closed ticket's channel is deleted.
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Snapshot of an open ticket, if `channel` is one.
    pub async fn ticket(&self, channel: ChannelId) -> Option<Ticket> {
        self.store.lock().await.tickets.get(&channel).cloned()
    }

    /// Snapshot of a user's vouch record.
    pub async fn vouch_record(&self, user: UserId) -> Option<vouch::VouchRecord> {
        self.store.lock().await.vouches.get(&user).cloned()
    }

    /// Save the store, logging rather than failing the triggering action.
    async fn persist(&self, store: &Store) {
        if let Err(e) = store.save().await {
            error!("Failed to save data: {:#}", e);
        }
    }

    /// Refuse channels whose close is in flight. Callers keep the guard until
    /// their store update is done, so a close cannot snapshot the ticket
    /// between the check and the update.
    async fn lock_unless_closing(
        &self,
        channel: ChannelId,
    ) -> BotResult<MutexGuard<'_, HashSet<ChannelId>>> {
        let closing = self.closing.lock().await;
        if closing.contains(&channel) {
            return Err(BotError::NotATicket);
        }
        Ok(closing)
    }

    /// Post to an optional log channel; failures are logged and ignored.
    async fn post_log(&self, channel: Option<ChannelId>, what: &str, message: &Message) {
        let Some(channel) = channel else {
            warn!("No {} channel configured, skipping post", what);
            return;
        };
        if let Err(e) = self.platform.send_message(channel, message).await {
            error!("Failed to post to {} channel {}: {:#}", what, channel, e);
        }
    }

    // =========================================================================
    // Informational commands
    // =========================================================================

    pub fn rules(&self) -> Reply {
        Reply::public(content::rules())
    }

    pub fn faq(&self) -> Reply {
        Reply::public(content::faq())
    }

    pub fn tos(&self) -> Reply {
        Reply::public(content::tos())
    }

    // =========================================================================
    // Tickets
    // =========================================================================

    /// Post the open-ticket panel in `channel`. Managers only.
    pub async fn setup_ticket(&self, actor: &Actor, channel: ChannelId) -> BotResult<Reply> {
        if !is_manager(actor, &self.settings) {
            return Err(BotError::NotAuthorized(
                "No permission. Only Managers can use this.".to_string(),
            ));
        }
        self.platform
            .send_message(channel, &content::ticket_panel())
            .await?;
        info!("Ticket panel deployed in channel {} by {}", channel, actor.id);
        Ok(Reply::private(Message::text(
            "✅ Ticket panel deployed successfully.",
        )))
    }

    pub async fn open_ticket(&self, actor: &Actor) -> BotResult<Reply> {
        let category = self
            .settings
            .tickets_category
            .ok_or_else(|| BotError::Configuration("Ticket category".to_string()))?;
        if !self.platform.channel_exists(category).await? {
            return Err(BotError::Configuration("Ticket category".to_string()));
        }

        let request = NewTicketChannel {
            name: format!("ticket-{}", actor.name),
            category,
            owner: actor.id,
            staff_role: self.settings.middleman_role,
        };
        let channel = self.platform.create_ticket_channel(&request).await?;

        {
            let mut store = self.store.lock().await;
            ticket::open(&mut store.tickets, channel, actor.id);
            self.persist(&store).await;
        }
        info!("Opened ticket channel {} for {}", channel, actor.id);

        let panel = content::ticket_entry_panel(None).with_content(format!(
            "{} {}",
            mention_user(actor.id),
            mention_role(self.settings.middleman_role)
        ));
        if let Err(e) = self.platform.send_message(channel, &panel).await {
            error!("Failed to post entry panel in ticket {}: {:#}", channel, e);
        }

        Ok(Reply::private(Message::text(format!(
            "✅ Your ticket has been created: {}",
            mention_channel(channel)
        ))))
    }

    pub async fn claim_ticket(&self, actor: &Actor, channel: ChannelId) -> BotResult<Reply> {
        {
            let _closing = self.lock_unless_closing(channel).await?;
            let mut store = self.store.lock().await;
            ticket::claim(&mut store.tickets, channel, actor, &self.settings)?;
            self.persist(&store).await;
        }
        info!("Ticket {} claimed by {}", channel, actor.id);

        if let Err(e) = self
            .platform
            .set_member_access(channel, actor.id, MemberAccess::HANDLER)
            .await
        {
            error!("Failed to grant claimer access in {}: {:#}", channel, e);
        }

        Ok(Reply::update(content::ticket_entry_panel(Some(actor.id))))
    }

    /// Give `user` access to the ticket in `channel`. Any member may do this.
    pub async fn add_member(&self, channel: ChannelId, user: UserId) -> BotResult<Reply> {
        {
            let _closing = self.lock_unless_closing(channel).await?;
            let store = self.store.lock().await;
            ticket::open_ticket(&store.tickets, channel)?;
        }
        self.platform
            .set_member_access(channel, user, MemberAccess::PARTICIPANT)
            .await?;
        Ok(Reply::public(Message::text(format!(
            "✅ {} was added to this ticket.",
            mention_user(user)
        ))))
    }

    pub async fn transfer_ticket(&self, channel: ChannelId, new_owner: UserId) -> BotResult<Reply> {
        let previous = {
            let _closing = self.lock_unless_closing(channel).await?;
            let mut store = self.store.lock().await;
            let previous = ticket::transfer(&mut store.tickets, channel, new_owner)?;
            self.persist(&store).await;
            previous
        };
        info!(
            "Ticket {} transferred from {} to {}",
            channel, previous, new_owner
        );
        Ok(Reply::public(Message::text(format!(
            "✅ Ticket ownership transferred to {}",
            mention_user(new_owner)
        ))))
    }

    /// Authorize and acknowledge a close.
    ///
    /// The returned [`PendingClose`] must be passed to [`Bot::finish_close`],
    /// normally on a spawned task, once the acknowledgement has been sent.
    /// Until then the channel is marked as closing and no other ticket action
    /// can address it.
    pub async fn begin_close(
        &self,
        actor: &Actor,
        channel: ChannelId,
    ) -> BotResult<(Reply, PendingClose)> {
        let mut closing = self.closing.lock().await;
        if closing.contains(&channel) {
            return Err(BotError::NotATicket);
        }
        let ticket = {
            let store = self.store.lock().await;
            ticket::authorize_close(&store.tickets, channel, actor)?
        };
        closing.insert(channel);

        let reply = Reply::public(Message::text(format!(
            "⌛ Archiving chat and closing channel in {}s...",
            self.close_grace.as_secs()
        )));
        Ok((
            reply,
            PendingClose {
                channel,
                ticket,
                closer: actor.id,
            },
        ))
    }

    /// Emit the transcript, drop the ticket, persist, wait out the grace
    /// period and delete the channel.
    pub async fn finish_close(&self, pending: PendingClose) {
        let PendingClose {
            channel,
            ticket,
            closer,
        } = pending;

        let body = match self.platform.channel_history(channel).await {
            Ok(history) => transcript_body(&history),
            Err(e) => {
                error!("Failed to read history of ticket {}: {:#}", channel, e);
                String::new()
            }
        };
        let transcript = Message::embed(transcript_embed(&ticket, closer, &body, Utc::now()));
        self.post_log(self.settings.transcript_channel, "transcript", &transcript)
            .await;

        {
            let mut store = self.store.lock().await;
            if let Err(e) = ticket::close(&mut store.tickets, channel) {
                warn!("Ticket {} vanished before close completed: {}", channel, e);
            }
            self.persist(&store).await;
        }
        info!("Ticket {} closed by {}", channel, closer);

        tokio::time::sleep(self.close_grace).await;

        if let Err(e) = self.platform.delete_channel(channel).await {
            error!("Failed to delete ticket channel {}: {:#}", channel, e);
        }
        self.closing.lock().await.remove(&channel);
    }

    /// Close a ticket end to end, for callers with nothing to send in between.
    pub async fn close_ticket(&self, actor: &Actor, channel: ChannelId) -> BotResult<Reply> {
        let (reply, pending) = self.begin_close(actor, channel).await?;
        self.finish_close(pending).await;
        Ok(reply)
    }

    // =========================================================================
    // Vouches
    // =========================================================================

    pub async fn vouch(&self, actor: &Actor, target: &Actor, reason: &str) -> BotResult<Reply> {
        let total = {
            let mut store = self.store.lock().await;
            let total = vouch::record_vouch(&mut store.vouches, actor.id, target.id, reason);
            self.persist(&store).await;
            total
        };
        info!("Recorded vouch #{} for {} from {}", total, target.id, actor.id);

        let summary = content::vouch_summary(actor.id, target.id, reason, total, Utc::now());
        self.post_log(self.settings.vouch_channel, "vouch", &summary)
            .await;

        Ok(Reply::private(Message::text(format!(
            "✅ Your vouch for {} has been recorded.",
            mention_user(target.id)
        ))))
    }

    pub async fn stats(&self, target: &Actor) -> BotResult<Reply> {
        let stats = {
            let store = self.store.lock().await;
            vouch::stats(&store.vouches, target.id)?
        };
        Ok(Reply::public(content::vouch_stats(&target.name, &stats)))
    }

    // =========================================================================
    // Role invitations
    // =========================================================================

    /// Invite `target` to the configured invitation role. Middlemen only.
    pub async fn invite(&self, actor: &Actor, target: &Actor, now_unix: i64) -> BotResult<Reply> {
        if !is_middleman(actor, &self.settings) {
            return Err(BotError::NotAuthorized(
                "Only Verified Middlemen can use this command.".to_string(),
            ));
        }
        if has_role(target, self.settings.info_role) {
            return Err(BotError::AlreadyHasRole(target.id));
        }
        Ok(Reply::public(content::invitation(
            target.id,
            actor.id,
            self.settings.info_role,
            now_unix,
        )))
    }

    pub async fn answer_invitation(
        &self,
        actor: &Actor,
        answer: InvitationAnswer,
        target: UserId,
        staff: UserId,
        issued_at: i64,
        now_unix: i64,
    ) -> BotResult<Reply> {
        if actor.id != target {
            return Err(BotError::NotAuthorized(
                "Only the targeted user can respond to this.".to_string(),
            ));
        }
        // A timestamp from the future was not issued by us.
        if issued_at > now_unix || now_unix.saturating_sub(issued_at) > INVITATION_TTL_SECS {
            return Err(BotError::Expired("invitation"));
        }

        let now = Utc::now();
        let accepted = answer == InvitationAnswer::Accept;
        let text = if accepted {
            self.platform
                .add_role(target, self.settings.info_role)
                .await?;

            let welcome = content::invitation_welcome(self.settings.info_role, now);
            match self.platform.send_direct_message(target, &welcome).await {
                Ok(()) => {}
                Err(e) => debug!("Welcome DM to {} not delivered: {:#}", target, e),
            }
            format!("{} has accepted the invitation.", mention_user(target))
        } else {
            format!("{} has declined the invitation.", mention_user(target))
        };
        info!(
            "Invitation from {} {} by {}",
            staff,
            if accepted { "accepted" } else { "declined" },
            target
        );

        let log = content::invitation_log(target, staff, accepted, now);
        self.post_log(self.settings.info_log_channel, "info log", &log)
            .await;

        // Answering replaces the invitation, which removes its controls.
        Ok(Reply::update(Message::text(text)))
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub async fn manage_role(
        &self,
        actor: &Actor,
        target: UserId,
        role: &RoleRef,
        action: &str,
    ) -> BotResult<Reply> {
        if !is_manager(actor, &self.settings) {
            return Err(BotError::NotAuthorized(
                "Only Managers can use this command.".to_string(),
            ));
        }
        let text = match parse_role_action(action)? {
            RoleAction::Add => {
                self.platform.add_role(target, role.id).await?;
                format!("✅ {} added to {}", role.name, mention_user(target))
            }
            RoleAction::Remove => {
                self.platform.remove_role(target, role.id).await?;
                format!("✅ {} removed from {}", role.name, mention_user(target))
            }
        };
        info!("{} ran managerole {} {} on {}", actor.id, action, role.id, target);
        Ok(Reply::public(Message::text(text)))
    }

    pub async fn manage_ban(&self, actor: &Actor, user: &str, action: &str) -> BotResult<Reply> {
        if !is_manager(actor, &self.settings) {
            return Err(BotError::NotAuthorized(
                "Only Managers can use this command.".to_string(),
            ));
        }
        let target = parse_user_reference(user)?;
        let action = parse_ban_action(action)?;

        let target_name = match self.platform.fetch_user_name(target).await {
            Ok(name) => name,
            Err(e) => {
                debug!("Could not resolve user {}: {:#}", target, e);
                format!("Unknown User ({})", target)
            }
        };

        let (banned, text) = match action {
            BanAction::Ban => {
                let reason = format!("Banned by {}", actor.name);
                self.platform.ban(target, &reason).await?;
                (true, format!("✅ User ID `{}` has been banned.", target))
            }
            BanAction::Unban => {
                let reason = format!("Unbanned by {}", actor.name);
                self.platform.unban(target, &reason).await?;
                (false, format!("✅ User ID `{}` has been unbanned.", target))
            }
        };
        info!("{} ran {} on {}", actor.id, action, target);

        let log = content::ban_log(banned, &target_name, target, actor.id, Utc::now());
        self.post_log(self.settings.ban_log_channel, "ban log", &log)
            .await;

        Ok(Reply::public(Message::text(text)))
    }

    // =========================================================================
    // Trade confirmation
    // =========================================================================

    /// Start a confirmation whose message is the response to interaction `session`.
    pub async fn start_trade(
        &self,
        session: InteractionId,
        interaction_token: &str,
        trader1: UserId,
        trader2: UserId,
        trade_info: &str,
    ) -> Reply {
        let trade = TradeConfirmation::new(
            session,
            trader1,
            trader2,
            trade_info,
            interaction_token,
            Instant::now(),
        );
        let message = self.trades.lock().await.start(trade);
        info!("Trade confirmation {} started for {} and {}", session, trader1, trader2);
        Reply::public(message)
    }

    pub async fn press_trade(
        &self,
        actor: &Actor,
        session: InteractionId,
        slot: TradeSlot,
    ) -> BotResult<Reply> {
        let message = self
            .trades
            .lock()
            .await
            .press(session, actor.id, slot, Instant::now())?;
        info!("Trader {} confirmed trade {}", slot.number(), session);
        Ok(Reply::update(message))
    }

    /// Drop expired confirmations and disable their controls. Returns how many expired.
    pub async fn sweep_trades(&self) -> usize {
        self.sweep_trades_at(Instant::now()).await
    }

    pub async fn sweep_trades_at(&self, now: Instant) -> usize {
        let expired = self.trades.lock().await.sweep(now);
        for trade in &expired {
            if let Err(e) = self
                .platform
                .edit_original_response(&trade.token, &trade.message)
                .await
            {
                warn!(
                    "Failed to disable controls of expired trade {}: {:#}",
                    trade.session, e
                );
            }
        }
        expired.len()
    }
}
