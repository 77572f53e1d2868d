use anyhow::{anyhow, Context, Result};
use ed25519_dalek::VerifyingKey;
use std::env;
use std::path::PathBuf;

use tradedesk_core::{ChannelId, GuildSettings, RoleId};

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub application_id: u64,
    pub guild_id: u64,
    pub public_key: VerifyingKey,
    pub port: u16,
    /// Directory holding `vouches.json` and `tickets.json`.
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    pub guild: GuildSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("DISCORD_TOKEN")
            .or_else(|_| env::var("BOT_TOKEN"))
            .context("DISCORD_TOKEN (or BOT_TOKEN) environment variable is required")?;

        let application_id = required_id("DISCORD_APPLICATION_ID")?;
        let guild_id = required_id("DISCORD_GUILD_ID")?;

        let public_key = parse_public_key(
            &env::var("DISCORD_PUBLIC_KEY")
                .context("DISCORD_PUBLIC_KEY environment variable is required")?,
        )?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let guild = GuildSettings {
            tickets_category: Some(ChannelId(required_id("TICKETS_CATEGORY_ID")?)),
            transcript_channel: optional_id("TRANSCRIPT_CHANNEL_ID")?.map(ChannelId),
            vouch_channel: optional_id("VOUCH_CHANNEL_ID")?.map(ChannelId),
            info_log_channel: optional_id("INFO_LOG_CHANNEL_ID")?.map(ChannelId),
            ban_log_channel: optional_id("BAN_LOG_CHANNEL_ID")?.map(ChannelId),
            middleman_role: RoleId(required_id("MIDDLEMAN_ROLE_ID")?),
            manager_role: RoleId(required_id("MANAGER_ROLE_ID")?),
            info_role: RoleId(required_id("INFO_ROLE_ID")?),
        };

        Ok(Config {
            bot_token,
            application_id,
            guild_id,
            public_key,
            port,
            state_dir,
            guild,
        })
    }
}

fn required_id(name: &str) -> Result<u64> {
    env::var(name)
        .with_context(|| format!("{} environment variable is required", name))?
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{} must be a valid id", name))
}

fn optional_id(name: &str) -> Result<Option<u64>> {
    parse_optional_id(env::var(name).ok()).with_context(|| format!("{} must be a valid id", name))
}

/// Parse an optional id from an environment value.
///
/// Missing, empty and whitespace-only values all mean "not configured".
pub fn parse_optional_id(value: Option<String>) -> Result<Option<u64>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Ok(Some(s.parse::<u64>()?)),
    }
}

/// Parse the application's hex-encoded Ed25519 public key.
pub fn parse_public_key(value: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(value.trim()).context("DISCORD_PUBLIC_KEY must be hex")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow!("DISCORD_PUBLIC_KEY must be 32 bytes"))?;
    VerifyingKey::from_bytes(&bytes).context("DISCORD_PUBLIC_KEY is not a valid Ed25519 key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    #[test]
    fn test_parse_optional_id_missing_or_blank() {
        assert_eq!(parse_optional_id(None).unwrap(), None);
        assert_eq!(parse_optional_id(Some(String::new())).unwrap(), None);
        assert_eq!(parse_optional_id(Some("   ".to_string())).unwrap(), None);
    }

    #[test]
    fn test_parse_optional_id_value() {
        assert_eq!(
            parse_optional_id(Some(" 1234 ".to_string())).unwrap(),
            Some(1234)
        );
        assert!(parse_optional_id(Some("channel".to_string())).is_err());
    }

    #[test]
    fn test_parse_public_key() {
        let key = SigningKey::from_bytes(&[3u8; 32]).verifying_key();
        let encoded = hex::encode(key.to_bytes());
        assert_eq!(parse_public_key(&encoded).unwrap(), key);
    }

    #[test]
    fn test_parse_public_key_rejects_bad_input() {
        assert!(parse_public_key("zz").is_err());
        assert!(parse_public_key("abcd").is_err());
    }
}
