//! In-memory `Platform` that records every call.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{MemberAccess, NewTicketChannel, Platform};
use crate::ids::{ChannelId, MessageId, RoleId, UserId};
use crate::message::Message;
use crate::transcript::HistoryMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    CreateTicketChannel(NewTicketChannel),
    SetMemberAccess {
        channel: ChannelId,
        user: UserId,
        access: MemberAccess,
    },
    SendMessage {
        channel: ChannelId,
        message: Message,
    },
    ChannelHistory(ChannelId),
    DeleteChannel(ChannelId),
    AddRole(UserId, RoleId),
    RemoveRole(UserId, RoleId),
    Ban(UserId, String),
    Unban(UserId, String),
    DirectMessage(UserId, Message),
    EditOriginalResponse(String, Message),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<PlatformCall>,
    channels: HashSet<ChannelId>,
    history: HashMap<ChannelId, Vec<HistoryMessage>>,
    user_names: HashMap<UserId, String>,
    closed_dms: HashSet<UserId>,
    failing_bans: bool,
    failing_history: bool,
    failing_deletes: bool,
    next_id: u64,
}

/// Test double for [`Platform`].
///
/// Channels it creates are remembered so `channel_exists` reports them;
/// other channels must be registered with [`FakePlatform::with_channel`].
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 10_000,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_channel(self, channel: ChannelId) -> Self {
        self.lock().channels.insert(channel);
        self
    }

    pub fn with_user_name(self, user: UserId, name: impl Into<String>) -> Self {
        self.lock().user_names.insert(user, name.into());
        self
    }

    /// Make direct messages to `user` fail.
    pub fn with_closed_dms(self, user: UserId) -> Self {
        self.lock().closed_dms.insert(user);
        self
    }

    pub fn with_failing_bans(self) -> Self {
        self.lock().failing_bans = true;
        self
    }

    /// Make every history read fail.
    pub fn with_failing_history(self) -> Self {
        self.lock().failing_history = true;
        self
    }

    /// Make channel deletion fail; the channel stays in place.
    pub fn with_failing_deletes(self) -> Self {
        self.lock().failing_deletes = true;
        self
    }

    pub fn set_history(&self, channel: ChannelId, history: Vec<HistoryMessage>) {
        self.lock().history.insert(channel, history);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    /// Messages sent to `channel`, in order.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<Message> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                PlatformCall::SendMessage { channel: c, message } if *c == channel => {
                    Some(message.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn channel_exists(&self, channel: ChannelId) -> Result<bool> {
        Ok(self.lock().channels.contains(&channel))
    }

    async fn create_ticket_channel(&self, request: &NewTicketChannel) -> Result<ChannelId> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = ChannelId(state.next_id);
        state.channels.insert(id);
        state
            .calls
            .push(PlatformCall::CreateTicketChannel(request.clone()));
        Ok(id)
    }

    async fn set_member_access(
        &self,
        channel: ChannelId,
        user: UserId,
        access: MemberAccess,
    ) -> Result<()> {
        self.record(PlatformCall::SetMemberAccess {
            channel,
            user,
            access,
        });
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, message: &Message) -> Result<MessageId> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = MessageId(state.next_id);
        state.calls.push(PlatformCall::SendMessage {
            channel,
            message: message.clone(),
        });
        Ok(id)
    }

    async fn channel_history(&self, channel: ChannelId) -> Result<Vec<HistoryMessage>> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::ChannelHistory(channel));
        if state.failing_history {
            return Err(anyhow!("Missing Access"));
        }
        Ok(state.history.get(&channel).cloned().unwrap_or_default())
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::DeleteChannel(channel));
        if state.failing_deletes {
            return Err(anyhow!("Missing Permissions"));
        }
        state.channels.remove(&channel);
        Ok(())
    }

    async fn add_role(&self, user: UserId, role: RoleId) -> Result<()> {
        self.record(PlatformCall::AddRole(user, role));
        Ok(())
    }

    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<()> {
        self.record(PlatformCall::RemoveRole(user, role));
        Ok(())
    }

    async fn ban(&self, user: UserId, reason: &str) -> Result<()> {
        if self.lock().failing_bans {
            return Err(anyhow!("Missing Permissions"));
        }
        self.record(PlatformCall::Ban(user, reason.to_string()));
        Ok(())
    }

    async fn unban(&self, user: UserId, reason: &str) -> Result<()> {
        if self.lock().failing_bans {
            return Err(anyhow!("Missing Permissions"));
        }
        self.record(PlatformCall::Unban(user, reason.to_string()));
        Ok(())
    }

    async fn fetch_user_name(&self, user: UserId) -> Result<String> {
        self.lock()
            .user_names
            .get(&user)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown User"))
    }

    async fn send_direct_message(&self, user: UserId, message: &Message) -> Result<()> {
        if self.lock().closed_dms.contains(&user) {
            return Err(anyhow!("Cannot send messages to this user"));
        }
        self.record(PlatformCall::DirectMessage(user, message.clone()));
        Ok(())
    }

    async fn edit_original_response(
        &self,
        interaction_token: &str,
        message: &Message,
    ) -> Result<()> {
        self.record(PlatformCall::EditOriginalResponse(
            interaction_token.to_string(),
            message.clone(),
        ));
        Ok(())
    }
}
