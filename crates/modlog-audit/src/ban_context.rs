//! Ban-context query
//!
//! Reconstructs what a user posted before being banned: every channel the
//! directory lists for the guild is scanned, filtered to the user's messages
//! and to the configured history window.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use modlog_core::{ChannelDirectory, ChannelId, GuildId, StoredMessage, UserId};
use modlog_storage::MessageStore;

use crate::error::{AuditError, AuditResult};
use crate::transcript::Transcript;

/// Which messages a ban-context query reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryWindow {
    /// Everything the store holds
    Unbounded,
    /// Messages created within the last `hours`
    Trailing { hours: u64 },
}

impl HistoryWindow {
    /// Messages from the last `hours` hours
    pub fn trailing_hours(hours: u64) -> Self {
        Self::Trailing { hours }
    }

    /// Oldest creation time still inside the window
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Unbounded => None,
            Self::Trailing { hours } => {
                let hours = i64::try_from(hours).unwrap_or(i64::MAX);
                Some(
                    Duration::try_hours(hours)
                        .and_then(|span| now.checked_sub_signed(span))
                        .unwrap_or(DateTime::<Utc>::MIN_UTC),
                )
            }
        }
    }

    /// Whether a message created at `created_at` is inside the window
    pub fn contains(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.lower_bound(now).is_none_or(|bound| created_at >= bound)
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Trailing { hours } => write!(f, "{hours}h"),
        }
    }
}

impl FromStr for HistoryWindow {
    type Err = AuditError;

    /// Accepts `unbounded`, `24h` or a bare hour count
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::Unbounded);
        }

        let digits = s.strip_suffix('h').unwrap_or(s);
        match digits.parse::<u64>() {
            Ok(hours) if hours > 0 => Ok(Self::Trailing { hours }),
            _ => Err(AuditError::Config(format!(
                "invalid history window {s:?}, expected \"unbounded\" or hours like \"24h\""
            ))),
        }
    }
}

/// Everything a user posted in a guild, per channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanContext {
    pub guild: GuildId,
    pub user: UserId,
    /// Only channels with at least one matching message appear
    pub transcripts: BTreeMap<ChannelId, Transcript>,
    /// Channels whose scan failed
    pub skipped_channels: Vec<ChannelId>,
}

impl BanContext {
    /// Empty context
    pub fn new(guild: GuildId, user: UserId) -> Self {
        Self {
            guild,
            user,
            transcripts: BTreeMap::new(),
            skipped_channels: Vec::new(),
        }
    }

    /// No history was found
    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    /// Total number of messages across all transcripts
    pub fn message_count(&self) -> usize {
        self.transcripts.values().map(Transcript::len).sum()
    }
}

/// Inputs of one ban-context query
pub(crate) struct BanContextQuery<'a> {
    pub messages: &'a MessageStore,
    pub directory: &'a dyn ChannelDirectory,
    pub window: HistoryWindow,
    pub now: DateTime<Utc>,
    pub concurrency: usize,
}

impl BanContextQuery<'_> {
    /// Run the query; scan failures skip the channel, never the query
    #[instrument(skip(self), fields(window = %self.window))]
    pub async fn run(&self, guild: GuildId, user: UserId) -> BanContext {
        let channels = self.directory.channels(guild);
        debug!(channels = channels.len(), "Collecting ban context");

        let scans = stream::iter(channels)
            .map(|channel| {
                let store = self.messages.clone();
                let channel = channel.id;
                async move {
                    let result = tokio::task::spawn_blocking(move || {
                        store.scan_by_channel(guild, channel)
                    })
                    .await
                    .map_err(AuditError::from)
                    .and_then(|scan| scan.map_err(AuditError::from));
                    (channel, result)
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut context = BanContext::new(guild, user);
        for (channel, result) in scans {
            match self.select(user, result) {
                Ok(matches) if matches.is_empty() => {}
                Ok(matches) => {
                    context
                        .transcripts
                        .insert(channel, Transcript::new(guild, channel, user, matches));
                }
                Err(e) => {
                    warn!(%guild, %channel, error = %e, "Skipping channel in ban context");
                    context.skipped_channels.push(channel);
                }
            }
        }
        context.skipped_channels.sort_unstable();

        debug!(
            transcripts = context.transcripts.len(),
            messages = context.message_count(),
            skipped = context.skipped_channels.len(),
            "Ban context collected"
        );
        context
    }

    fn select(
        &self,
        user: UserId,
        scan: AuditResult<Vec<StoredMessage>>,
    ) -> AuditResult<Vec<StoredMessage>> {
        Ok(scan?
            .into_iter()
            .filter(|m| m.author_id == user)
            .filter(|m| self.window.contains(m.created_at(), self.now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlog_core::Snowflake;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let now = at(1_700_000_000_000);
        assert!(HistoryWindow::Unbounded.contains(at(0), now));

        let day = HistoryWindow::trailing_hours(24);
        assert!(day.contains(now, now));
        assert!(day.contains(at(1_700_000_000_000 - 24 * 3_600_000), now));
        assert!(!day.contains(at(1_700_000_000_000 - 24 * 3_600_000 - 1), now));
    }

    #[test]
    fn test_window_huge_hours_saturates() {
        let now = at(1_700_000_000_000);
        let window = HistoryWindow::trailing_hours(u64::MAX);
        assert_eq!(window.lower_bound(now), Some(DateTime::<Utc>::MIN_UTC));
        assert!(window.contains(at(0), now));
    }

    #[test]
    fn test_window_parse() {
        assert_eq!("unbounded".parse::<HistoryWindow>().unwrap(), HistoryWindow::Unbounded);
        assert_eq!("24h".parse::<HistoryWindow>().unwrap(), HistoryWindow::trailing_hours(24));
        assert_eq!("6".parse::<HistoryWindow>().unwrap(), HistoryWindow::trailing_hours(6));
        assert!("0h".parse::<HistoryWindow>().is_err());
        assert!("forever".parse::<HistoryWindow>().is_err());
        assert_eq!(HistoryWindow::trailing_hours(24).to_string(), "24h");
    }

    #[test]
    fn test_empty_context() {
        let context = BanContext::new(Snowflake(1), Snowflake(42));
        assert!(context.is_empty());
        assert_eq!(context.message_count(), 0);
    }
}
