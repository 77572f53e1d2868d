//! Role predicates.
//!
//! These are pure checks over the role list the platform attaches to each
//! interaction; nothing here performs I/O.

use crate::ids::{RoleId, UserId};
use crate::settings::GuildSettings;

/// The member who triggered an interaction, with the roles they held at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub roles: Vec<RoleId>,
}

impl Actor {
    pub fn new(id: UserId, name: impl Into<String>, roles: Vec<RoleId>) -> Self {
        Self {
            id,
            name: name.into(),
            roles,
        }
    }
}

pub fn has_role(actor: &Actor, role: RoleId) -> bool {
    actor.roles.contains(&role)
}

pub fn is_manager(actor: &Actor, settings: &GuildSettings) -> bool {
    has_role(actor, settings.manager_role)
}

pub fn is_middleman(actor: &Actor, settings: &GuildSettings) -> bool {
    has_role(actor, settings.middleman_role)
}
