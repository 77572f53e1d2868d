pub mod commands;
pub mod config;
pub mod discord;
pub mod dispatch;
pub mod interaction;
pub mod sweeper;
pub mod webhook;

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use tradedesk_core::Bot;

pub use discord::DiscordClient;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

fn short_hash(hash: &str) -> String {
    if hash.len() >= 8 {
        hash[..8].to_string()
    } else {
        hash.to_string()
    }
}

pub fn get_bot_version() -> String {
    // Packaged builds pass the hash in explicitly
    if let Some(git_hash) = option_env!("TRADEDESK_GIT_HASH") {
        short_hash(git_hash)
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        short_hash(git_hash)
    } else {
        "unknown".to_string()
    }
}

pub struct AppState {
    pub bot: Arc<Bot>,
    /// Key the platform signs every interaction request with.
    pub public_key: VerifyingKey,
}
