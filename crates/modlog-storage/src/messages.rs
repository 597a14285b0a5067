//! Message record store
//!
//! Messages live under `{guild}\0{channel}\0{message}`. Scans return records
//! in ascending numeric id order, which is creation order for snowflakes.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace};

use modlog_core::{ChannelId, GuildId, MessageId, StoredMessage};

use crate::error::StorageError;
use crate::keys::{channel_prefix, decode_message_key, guild_prefix, message_key};
use crate::tables::{MESSAGES, RedbStorage};

/// Outcome of applying an edit to a stored message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditResult {
    /// No record exists under the key
    Missing,
    /// The stored content already equals the new content
    Unchanged,
    /// The content was replaced
    Edited {
        before: StoredMessage,
        after: StoredMessage,
    },
}

impl EditResult {
    /// Whether the record changed
    pub fn is_edited(&self) -> bool {
        matches!(self, Self::Edited { .. })
    }
}

fn encode(message: &StoredMessage) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(message).map_err(|e| StorageError::serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<StoredMessage, StorageError> {
    postcard::from_bytes(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
}

fn describe(guild: GuildId, channel: ChannelId, message: MessageId) -> String {
    format!("message {guild}/{channel}/{message}")
}

/// Durable store of message records
#[derive(Clone)]
pub struct MessageStore {
    storage: Arc<RedbStorage>,
}

impl MessageStore {
    /// Create a message store over shared storage
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// Insert or replace a message record
    pub fn put(&self, message: &StoredMessage) -> Result<(), StorageError> {
        let key = message_key(message.guild_id, message.channel_id, message.message_id);
        let value = encode(message)?;

        self.storage.put(MESSAGES, &key, &value)?;
        trace!(
            guild = %message.guild_id,
            channel = %message.channel_id,
            message = %message.message_id,
            attachments = message.attachments.len(),
            bytes = value.len(),
            "Stored message"
        );
        Ok(())
    }

    /// Get a message record, failing with `NotFound` when absent
    pub fn get(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<StoredMessage, StorageError> {
        self.find(guild, channel, message)?
            .ok_or_else(|| StorageError::not_found(describe(guild, channel, message)))
    }

    /// Get a message record if present
    pub fn find(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<StoredMessage>, StorageError> {
        let key = message_key(guild, channel, message);
        self.storage
            .get(MESSAGES, &key)?
            .map(|value| decode(&value))
            .transpose()
    }

    /// Remove a message record
    ///
    /// Returns `false` if nothing was stored under the key.
    pub fn delete(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<bool, StorageError> {
        let key = message_key(guild, channel, message);
        let removed = self.storage.delete(MESSAGES, &key)?;
        debug!(%guild, %channel, %message, removed, "Deleted message");
        Ok(removed)
    }

    /// Remove a message record, returning it if one was stored
    pub fn take(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<StoredMessage>, StorageError> {
        let key = message_key(guild, channel, message);
        let taken = self
            .storage
            .take(MESSAGES, &key)?
            .map(|value| decode(&value))
            .transpose()?;
        debug!(%guild, %channel, %message, removed = taken.is_some(), "Took message");
        Ok(taken)
    }

    /// All messages of a channel, oldest first
    #[instrument(skip(self), fields(%guild, %channel))]
    pub fn scan_by_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let prefix = channel_prefix(guild, channel);
        let entries = self.storage.scan_prefix(MESSAGES, &prefix)?;

        let mut messages = entries
            .iter()
            .map(|(_, value)| decode(value))
            .collect::<Result<Vec<_>, _>>()?;

        // Byte order of decimal keys is not numeric order ("100" < "99")
        messages.sort_by_key(|m| m.message_id);

        debug!(count = messages.len(), "Scanned channel");
        Ok(messages)
    }

    /// Replace the content of a stored message if it differs
    ///
    /// The read and the write happen in one write transaction.
    pub fn apply_edit(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<EditResult, StorageError> {
        let key = message_key(guild, channel, message);

        let result = self.storage.modify(MESSAGES, &key, |current| {
            let Some(bytes) = current else {
                return Ok((None, EditResult::Missing));
            };

            let before = decode(&bytes)?;
            let mut after = before.clone();
            if !after.apply_edit(content, edited_at) {
                return Ok((None, EditResult::Unchanged));
            }

            let value = encode(&after)?;
            Ok((Some(value), EditResult::Edited { before, after }))
        })?;

        debug!(%guild, %channel, %message, edited = result.is_edited(), "Applied edit");
        Ok(result)
    }

    /// Messages of a channel by id, oldest first
    ///
    /// Ids without a record are skipped. All reads come from one snapshot.
    pub fn get_many(
        &self,
        guild: GuildId,
        channel: ChannelId,
        ids: &[MessageId],
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let keys: Vec<_> = ids
            .iter()
            .map(|id| message_key(guild, channel, *id))
            .collect();

        let mut messages = Vec::with_capacity(keys.len());
        for value in self.storage.get_many(MESSAGES, &keys)?.into_iter().flatten() {
            messages.push(decode(&value)?);
        }

        messages.sort_by_key(|m| m.message_id);
        messages.dedup_by_key(|m| m.message_id);
        Ok(messages)
    }

    /// Channels of a guild holding at least one message record
    pub fn known_channels(&self, guild: GuildId) -> Result<Vec<ChannelId>, StorageError> {
        let keys = self.storage.scan_keys(MESSAGES, &guild_prefix(guild))?;

        let mut channels = BTreeSet::new();
        for key in keys {
            let (_, channel, _) = decode_message_key(&key)?;
            channels.insert(channel);
        }

        Ok(channels.into_iter().collect())
    }

    /// Number of message records in a channel
    pub fn count_channel(&self, guild: GuildId, channel: ChannelId) -> Result<usize, StorageError> {
        self.storage
            .count_prefix(MESSAGES, &channel_prefix(guild, channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::StorageConfig;
    use modlog_core::{Snowflake, StoredAttachment};
    use tempfile::TempDir;

    fn create_store() -> (MessageStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = RedbStorage::open(StorageConfig::in_dir(temp.path())).unwrap();
        (MessageStore::new(Arc::new(storage)), temp)
    }

    fn msg(guild: u64, channel: u64, id: u64, author: u64, content: &str) -> StoredMessage {
        StoredMessage::new(
            Snowflake(guild),
            Snowflake(channel),
            Snowflake(id),
            Snowflake(author),
            content,
        )
    }

    #[test]
    fn test_put_get_with_attachment_bytes() {
        let (store, _temp) = create_store();
        let message = msg(1, 1, 100, 42, "hi")
            .with_author_name("someone")
            .with_attachment(StoredAttachment::new("a.bin", vec![0u8, 255, 7], 3));

        store.put(&message).unwrap();
        let loaded = store.get(Snowflake(1), Snowflake(1), Snowflake(100)).unwrap();
        assert_eq!(loaded, message);
        assert_eq!(loaded.attachments[0].data.as_ref(), &[0u8, 255, 7]);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (store, _temp) = create_store();
        let err = store.get(Snowflake(1), Snowflake(1), Snowflake(5)).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.find(Snowflake(1), Snowflake(1), Snowflake(5)).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let (store, _temp) = create_store();
        store.put(&msg(1, 1, 100, 42, "first")).unwrap();
        store.put(&msg(1, 1, 100, 42, "second")).unwrap();

        let loaded = store.get(Snowflake(1), Snowflake(1), Snowflake(100)).unwrap();
        assert_eq!(loaded.content, "second");
        assert_eq!(store.count_channel(Snowflake(1), Snowflake(1)).unwrap(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, _temp) = create_store();
        store.put(&msg(1, 1, 100, 42, "hi")).unwrap();

        assert!(store.delete(Snowflake(1), Snowflake(1), Snowflake(100)).unwrap());
        assert!(!store.delete(Snowflake(1), Snowflake(1), Snowflake(100)).unwrap());
        assert!(!store.delete(Snowflake(9), Snowflake(9), Snowflake(9)).unwrap());
    }

    #[test]
    fn test_take_removes_and_returns() {
        let (store, _temp) = create_store();
        store.put(&msg(1, 1, 100, 42, "hi")).unwrap();

        let taken = store.take(Snowflake(1), Snowflake(1), Snowflake(100)).unwrap();
        assert_eq!(taken.unwrap().content, "hi");
        assert!(store.find(Snowflake(1), Snowflake(1), Snowflake(100)).unwrap().is_none());
        assert!(store.take(Snowflake(1), Snowflake(1), Snowflake(100)).unwrap().is_none());
    }

    #[test]
    fn test_scan_sorts_numerically() {
        let (store, _temp) = create_store();
        for id in [300u64, 100, 200, 99, 1000] {
            store.put(&msg(1, 1, id, 42, "x")).unwrap();
        }
        // Neighbouring channel whose decimal form shares a prefix
        store.put(&msg(1, 11, 50, 42, "other")).unwrap();

        let ids: Vec<u64> = store
            .scan_by_channel(Snowflake(1), Snowflake(1))
            .unwrap()
            .iter()
            .map(|m| m.message_id.get())
            .collect();
        assert_eq!(ids, vec![99, 100, 200, 300, 1000]);
    }

    #[test]
    fn test_scan_empty_channel() {
        let (store, _temp) = create_store();
        assert!(store.scan_by_channel(Snowflake(1), Snowflake(2)).unwrap().is_empty());
    }

    #[test]
    fn test_apply_edit() {
        let (store, _temp) = create_store();
        let (g, c, m) = (Snowflake(1), Snowflake(1), Snowflake(100));
        let now = Utc::now();

        assert_eq!(
            store.apply_edit(g, c, m, "anything", now).unwrap(),
            EditResult::Missing
        );

        store.put(&msg(1, 1, 100, 42, "hi")).unwrap();
        assert_eq!(store.apply_edit(g, c, m, "hi", now).unwrap(), EditResult::Unchanged);

        match store.apply_edit(g, c, m, "hi there", now).unwrap() {
            EditResult::Edited { before, after } => {
                assert_eq!(before.content, "hi");
                assert_eq!(after.content, "hi there");
                assert_eq!(after.edited_at, Some(now));
            }
            other => panic!("unexpected edit result: {other:?}"),
        }

        assert_eq!(store.get(g, c, m).unwrap().content, "hi there");
    }

    #[test]
    fn test_get_many_skips_missing() {
        let (store, _temp) = create_store();
        for id in [10u64, 20, 30] {
            store.put(&msg(1, 1, id, 42, "x")).unwrap();
        }

        let ids = [Snowflake(30), Snowflake(15), Snowflake(10), Snowflake(30)];
        let found = store.get_many(Snowflake(1), Snowflake(1), &ids).unwrap();
        let found: Vec<u64> = found.iter().map(|m| m.message_id.get()).collect();
        assert_eq!(found, vec![10, 30]);
    }

    #[test]
    fn test_known_channels() {
        let (store, _temp) = create_store();
        store.put(&msg(1, 20, 1, 42, "x")).unwrap();
        store.put(&msg(1, 3, 2, 42, "x")).unwrap();
        store.put(&msg(1, 3, 3, 42, "x")).unwrap();
        store.put(&msg(2, 7, 4, 42, "x")).unwrap();

        let channels = store.known_channels(Snowflake(1)).unwrap();
        assert_eq!(channels, vec![Snowflake(3), Snowflake(20)]);
    }
}
