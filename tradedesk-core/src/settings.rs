use crate::ids::{ChannelId, RoleId};

/// Guild-specific identifiers the handlers need.
///
/// Log destinations are optional: when one is unset the corresponding post is
/// skipped. The tickets category is optional at this level too, but opening a
/// ticket without it fails with a configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSettings {
    pub tickets_category: Option<ChannelId>,
    pub transcript_channel: Option<ChannelId>,
    pub vouch_channel: Option<ChannelId>,
    pub info_log_channel: Option<ChannelId>,
    pub ban_log_channel: Option<ChannelId>,
    pub middleman_role: RoleId,
    pub manager_role: RoleId,
    pub info_role: RoleId,
}
