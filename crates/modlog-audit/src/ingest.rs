//! Message ingestion, edits and deletions

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, instrument};

use modlog_core::{ChannelId, ChannelKind, GuildId, IncomingMessage, MessageId, StoredMessage};
use modlog_fetch::fetch_attachments;
use modlog_storage::EditResult;

use crate::AuditLog;
use crate::error::AuditResult;

/// Outcome of an edit event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Empty content: an embed or attachment-only update
    Ignored,
    /// The message was never recorded
    Missing,
    /// Same content as stored
    Unchanged,
    /// The stored content was replaced
    Edited {
        before: StoredMessage,
        after: StoredMessage,
    },
}

impl From<EditResult> for EditOutcome {
    fn from(result: EditResult) -> Self {
        match result {
            EditResult::Missing => Self::Missing,
            EditResult::Unchanged => Self::Unchanged,
            EditResult::Edited { before, after } => Self::Edited { before, after },
        }
    }
}

/// Records found for a bulk deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkDeletion {
    /// Recorded messages, oldest first
    pub messages: Vec<StoredMessage>,
    /// Deleted ids with no record, ascending
    pub missing: Vec<MessageId>,
}

impl AuditLog {
    /// Record a newly posted message
    ///
    /// Returns `None` for messages that are not recorded: automated authors
    /// and channels the directory knows are not text channels. Attachments
    /// are captured best-effort.
    #[instrument(skip_all, fields(guild = %message.guild_id, channel = %message.channel_id, message = %message.id))]
    pub async fn record_message(
        &self,
        message: &IncomingMessage,
    ) -> AuditResult<Option<StoredMessage>> {
        if message.author.bot {
            debug!("Ignoring message from automated account");
            return Ok(None);
        }

        let non_text = self
            .channels
            .channel(message.guild_id, message.channel_id)
            .filter(|channel| channel.kind != ChannelKind::Text);
        if let Some(channel) = non_text {
            debug!(kind = ?channel.kind, "Ignoring message outside a text channel");
            return Ok(None);
        }

        let fetch = &self.config.fetch;
        let attachments = fetch_attachments(
            self.source.as_ref(),
            &message.attachments,
            fetch.max_size,
            fetch.concurrency(),
        )
        .await;

        let mut record = StoredMessage::new(
            message.guild_id,
            message.channel_id,
            message.id,
            message.author.id,
            message.content.clone(),
        )
        .with_author_name(message.author.name.clone())
        .with_declared_attachments(message.attachments.len() as u32);
        record.attachments = attachments;

        debug!(
            declared = record.declared_attachments,
            captured = record.attachments.len(),
            "Recording message"
        );

        let stored = record.clone();
        self.blocking(move |storage| storage.messages().put(&stored))
            .await?;

        Ok(Some(record))
    }

    /// Apply an edit event to a recorded message
    #[instrument(skip(self, content))]
    pub async fn record_edit(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> AuditResult<EditOutcome> {
        if content.is_empty() {
            debug!("Ignoring edit without content");
            return Ok(EditOutcome::Ignored);
        }

        let content = content.to_string();
        let edited_at = self.clock.now_utc();
        let result = self
            .blocking(move |storage| {
                storage
                    .messages()
                    .apply_edit(guild, channel, message, &content, edited_at)
            })
            .await?;

        Ok(result.into())
    }

    /// Look up the record of a deleted message
    ///
    /// The record is removed afterwards when pruning is configured.
    #[instrument(skip(self))]
    pub async fn deleted_message(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> AuditResult<Option<StoredMessage>> {
        let prune = self.config.prune_deleted_messages;
        self.blocking(move |storage| {
            if prune {
                storage.messages().take(guild, channel, message)
            } else {
                storage.messages().find(guild, channel, message)
            }
        })
        .await
    }

    /// Look up the records of a bulk deletion
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn bulk_deleted_messages(
        &self,
        guild: GuildId,
        channel: ChannelId,
        ids: &[MessageId],
    ) -> AuditResult<BulkDeletion> {
        let prune = self.config.prune_deleted_messages;
        let ids = ids.to_vec();

        self.blocking(move |storage| {
            let messages = storage.messages().get_many(guild, channel, &ids)?;

            let found: BTreeSet<_> = messages.iter().map(|m| m.message_id).collect();
            let missing: Vec<_> = ids
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter(|id| !found.contains(id))
                .collect();

            if prune {
                for message in &messages {
                    storage
                        .messages()
                        .delete(guild, channel, message.message_id)?;
                }
            }

            debug!(found = messages.len(), missing = missing.len(), "Bulk deletion resolved");
            Ok(BulkDeletion { messages, missing })
        })
        .await
    }

    /// A single message record, if present
    pub async fn message(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> AuditResult<Option<StoredMessage>> {
        self.blocking(move |storage| storage.messages().find(guild, channel, message))
            .await
    }

    /// All recorded messages of a channel, oldest first
    pub async fn channel_history(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> AuditResult<Vec<StoredMessage>> {
        self.blocking(move |storage| storage.messages().scan_by_channel(guild, channel))
            .await
    }

    /// Channels of a guild with at least one recorded message
    pub async fn known_channels(&self, guild: GuildId) -> AuditResult<Vec<ChannelId>> {
        self.blocking(move |storage| storage.messages().known_channels(guild))
            .await
    }
}
