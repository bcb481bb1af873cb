//! Opaque identifiers used across the command schema.
//!
//! Identifiers are 64-bit integers that travel as decimal strings on the
//! wire. The layer never interprets them beyond the creation timestamp
//! encoded in the upper bits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Milliseconds between the Unix epoch and the platform epoch (2015-01-01).
const PLATFORM_EPOCH_MS: i64 = 1_420_070_400_000;

/// Opaque 64-bit identifier.
///
/// Serialized as a decimal string; decoded from either a string or a bare
/// integer. Zero means "unset".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this identifier is unset.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Creation time encoded in the identifier.
    ///
    /// Returns `None` for the zero identifier.
    #[must_use]
    pub fn created_at(self) -> Option<DateTime<Utc>> {
        if self.is_zero() {
            return None;
        }
        let offset = i64::try_from(self.0 >> 22).ok()?;
        DateTime::from_timestamp_millis(PLATFORM_EPOCH_MS + offset)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an identifier as a decimal string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v).map(Snowflake).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

/// Channel kind accepted by a channel option.
///
/// Kept open-ended: unknown kinds round-trip as their raw integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(pub u16);

impl ChannelType {
    /// Text channel inside a guild.
    pub const GUILD_TEXT: Self = Self(0);
    /// Direct message between two users.
    pub const DIRECT_MESSAGE: Self = Self(1);
    /// Voice channel inside a guild.
    pub const GUILD_VOICE: Self = Self(2);
    /// Direct message between multiple users.
    pub const GROUP_DM: Self = Self(3);
    /// Category that groups guild channels.
    pub const GUILD_CATEGORY: Self = Self(4);
    /// Announcement channel.
    pub const GUILD_NEWS: Self = Self(5);
    /// Thread inside an announcement channel.
    pub const GUILD_NEWS_THREAD: Self = Self(10);
    /// Public thread.
    pub const GUILD_PUBLIC_THREAD: Self = Self(11);
    /// Private thread.
    pub const GUILD_PRIVATE_THREAD: Self = Self(12);
    /// Stage channel.
    pub const GUILD_STAGE_VOICE: Self = Self(13);
}
