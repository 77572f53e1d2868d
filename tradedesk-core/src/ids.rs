//! Platform identifiers.
//!
//! Every platform object is addressed by a 64-bit snowflake. The platform's
//! JSON encodes snowflakes as strings while the on-disk store keeps them as
//! numbers, so the newtypes below accept either form when deserializing and
//! always serialize as numbers.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u64(self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(SnowflakeVisitor).map(Self)
            }
        }
    };
}

snowflake!(
    /// A user or guild member.
    UserId
);
snowflake!(
    /// A channel or category.
    ChannelId
);
snowflake!(
    /// A guild role.
    RoleId
);
snowflake!(
    /// A posted message.
    MessageId
);
snowflake!(
    /// An inbound interaction. Also used to key trade confirmations, since the
    /// message a command creates is bound 1:1 to the command's interaction.
    InteractionId
);

struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a snowflake as an unsigned integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative snowflake {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        v.parse::<u64>()
            .map_err(|_| E::custom(format!("invalid snowflake {:?}", v)))
    }
}

/// Mention syntax for a user, e.g. `<@123>`.
pub fn mention_user(id: UserId) -> String {
    format!("<@{}>", id)
}

/// Mention syntax for a channel, e.g. `<#123>`.
pub fn mention_channel(id: ChannelId) -> String {
    format!("<#{}>", id)
}

/// Mention syntax for a role, e.g. `<@&123>`.
pub fn mention_role(id: RoleId) -> String {
    format!("<@&{}>", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_deserialize_from_string_and_number() {
        let a: UserId = serde_json::from_str("\"1474846906369966203\"").unwrap();
        let b: UserId = serde_json::from_str("1474846906369966203").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(), 1474846906369966203);
    }

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ChannelId(42)).unwrap(), "42");
    }

    #[test]
    fn test_map_keys_round_through_strings() {
        let mut map = BTreeMap::new();
        map.insert(ChannelId(7), "x");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"7":"x"}"#);
        let back: BTreeMap<ChannelId, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&ChannelId(7)).map(String::as_str), Some("x"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<RoleId>("\"abc\"").is_err());
        assert!(serde_json::from_str::<RoleId>("-5").is_err());
    }

    #[test]
    fn test_mentions() {
        assert_eq!(mention_user(UserId(1)), "<@1>");
        assert_eq!(mention_channel(ChannelId(2)), "<#2>");
        assert_eq!(mention_role(RoleId(3)), "<@&3>");
    }
}
