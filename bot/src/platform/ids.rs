use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Discord sends snowflakes as strings, hand-written documents may use
/// plain integers. Both decode to the same `u64`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSnowflake {
    Int(u64),
    Str(String),
}

/// Parse a snowflake from its decimal string form.
pub fn parse_snowflake(raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid snowflake {raw:?}"))
}

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
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

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_snowflake(s).map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match RawSnowflake::deserialize(deserializer)? {
                    RawSnowflake::Int(v) => Ok(Self(v)),
                    RawSnowflake::Str(s) => parse_snowflake(&s)
                        .map(Self)
                        .map_err(serde::de::Error::custom),
                }
            }
        }
    };
}

snowflake_id!(
    /// A guild (server) ID.
    GuildId
);
snowflake_id!(
    /// A channel or category ID. Categories are channels on Discord.
    ChannelId
);
snowflake_id!(
    /// A message ID. Snowflakes grow with time, so ordering by ID is ordering by age.
    MessageId
);
snowflake_id!(
    /// An attachment ID.
    AttachmentId
);
snowflake_id!(
    /// A platform user ID. Roster members are identified by this.
    UserId
);
