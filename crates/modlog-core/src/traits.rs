//! Seams to collaborators outside the store
//!
//! - [`ChannelDirectory`]: the gateway layer's cached channel list
//! - [`Clock`]: time abstraction for testability

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::snowflake::{ChannelId, GuildId};

/// Kind of a guild channel, as far as the audit store cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A regular text channel; the only kind whose messages are recorded
    #[default]
    Text,
    /// Voice, category, forum and anything else
    Other,
}

/// Cached channel metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
}

impl ChannelInfo {
    /// A text channel
    pub fn text(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ChannelKind::Text,
        }
    }

    /// Set the kind
    pub fn with_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Cached channel enumeration supplied by the gateway layer
///
/// The store never discovers channels itself; queries that fan out across a
/// guild ask this directory which channels exist.
pub trait ChannelDirectory: Send + Sync {
    /// All known channels of a guild
    fn channels(&self, guild: GuildId) -> Vec<ChannelInfo>;

    /// Look up a single channel
    fn channel(&self, guild: GuildId, channel: ChannelId) -> Option<ChannelInfo> {
        self.channels(guild).into_iter().find(|c| c.id == channel)
    }
}

/// In-memory channel directory
///
/// Fed from guild-create events by whoever owns the gateway connection.
#[derive(Debug, Default)]
pub struct StaticChannelDirectory {
    guilds: DashMap<GuildId, Vec<ChannelInfo>>,
}

impl StaticChannelDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the channel list of a guild
    pub fn set_guild(&self, guild: GuildId, channels: Vec<ChannelInfo>) {
        self.guilds.insert(guild, channels);
    }

    /// Add or replace one channel
    pub fn upsert(&self, guild: GuildId, channel: ChannelInfo) {
        let mut entry = self.guilds.entry(guild).or_default();
        match entry.iter_mut().find(|c| c.id == channel.id) {
            Some(existing) => *existing = channel,
            None => entry.push(channel),
        }
    }

    /// Forget a guild
    pub fn remove_guild(&self, guild: GuildId) {
        self.guilds.remove(&guild);
    }
}

impl ChannelDirectory for StaticChannelDirectory {
    fn channels(&self, guild: GuildId) -> Vec<ChannelInfo> {
        self.guilds
            .get(&guild)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}
