pub mod bot;
pub mod command;
pub mod component;
pub mod content;
pub mod error;
pub mod ids;
pub mod message;
pub mod permissions;
pub mod platform;
pub mod settings;
pub mod store;
pub mod ticket;
pub mod trade;
pub mod transcript;
pub mod vouch;

pub use bot::{Bot, PendingClose, RoleRef};
pub use component::ComponentAction;
pub use error::{BotError, BotResult};
pub use ids::{ChannelId, InteractionId, MessageId, RoleId, UserId};
pub use message::{Message, Reply, ReplyKind};
pub use permissions::Actor;
pub use platform::{FakePlatform, Platform};
pub use settings::GuildSettings;
pub use store::{Store, StorePaths};
