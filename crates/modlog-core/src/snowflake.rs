//! Snowflake identifiers and the clock embedded in them
//!
//! Every guild, channel, message, user and role on the platform is named by a
//! 64-bit snowflake. The high 42 bits hold milliseconds since the platform
//! epoch, so ordering snowflakes numerically orders them by creation time.

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InvalidIdentifier;

/// Platform epoch (2015-01-01T00:00:00Z) in Unix milliseconds
pub const PLATFORM_EPOCH_MILLIS: u64 = 1_420_070_400_000;

/// Bits below the timestamp (worker, process, increment)
const TIMESTAMP_SHIFT: u32 = 22;

/// A platform-issued numeric identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(pub u64);

pub type GuildId = Snowflake;
pub type ChannelId = Snowflake;
pub type MessageId = Snowflake;
pub type UserId = Snowflake;
pub type RoleId = Snowflake;

impl Snowflake {
    /// Wrap a raw identifier
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parse the canonical decimal form
    ///
    /// Only non-empty strings of ASCII digits that fit in a `u64` are
    /// accepted; signs, whitespace and radix prefixes are rejected.
    pub fn parse(input: &str) -> Result<Self, InvalidIdentifier> {
        if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidIdentifier::new(input));
        }
        input
            .parse::<u64>()
            .map(Self)
            .map_err(|_| InvalidIdentifier::new(input))
    }

    /// Unix milliseconds at which this identifier was minted
    pub const fn timestamp_millis(self) -> u64 {
        (self.0 >> TIMESTAMP_SHIFT) + PLATFORM_EPOCH_MILLIS
    }

    /// Instant at which this identifier was minted
    pub fn created_at(self) -> DateTime<Utc> {
        // The largest possible value lands in 2154, well inside chrono's range.
        DateTime::from_timestamp_millis(self.timestamp_millis() as i64)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Smallest snowflake minted at `time`
    ///
    /// Instants before the platform epoch saturate to zero. Useful as a lower
    /// bound when filtering records to a trailing time window.
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let millis = time.timestamp_millis();
        if millis <= PLATFORM_EPOCH_MILLIS as i64 {
            return Self(0);
        }
        let offset = (millis as u64 - PLATFORM_EPOCH_MILLIS).min(u64::MAX >> TIMESTAMP_SHIFT);
        Self(offset << TIMESTAMP_SHIFT)
    }
}

/// Decode the creation instant of an identifier string
///
/// This is the snowflake clock: deterministic for a given input and never
/// panicking on malformed input.
pub fn created_at(id: &str) -> Result<DateTime<Utc>, InvalidIdentifier> {
    Snowflake::parse(id).map(Snowflake::created_at)
}

/// Whole days between an identifier's creation and `now`
pub fn account_age_days(id: &str, now: DateTime<Utc>) -> Result<i64, InvalidIdentifier> {
    let created = created_at(id)?;
    Ok((now - created).num_days())
}

impl Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// Text formats carry identifiers as strings (the platform's JSON does this to
// survive 53-bit float parsers); binary formats carry the raw integer.
impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(SnowflakeVisitor)
        } else {
            deserializer.deserialize_u64(SnowflakeVisitor)
        }
    }
}

struct SnowflakeVisitor;

impl Visitor<'_> for SnowflakeVisitor {
    type Value = Snowflake;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal identifier string or unsigned integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
        Ok(Snowflake(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
        u64::try_from(v)
            .map(Snowflake)
            .map_err(|_| E::custom(format!("negative identifier: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
        Snowflake::parse(v).map_err(E::custom)
    }
}
