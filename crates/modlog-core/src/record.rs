//! Records persisted by the audit store

use std::collections::BTreeSet;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snowflake::{ChannelId, GuildId, MessageId, RoleId, UserId};

/// Attachment bytes captured at ingestion time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAttachment {
    /// File name as uploaded
    pub filename: String,
    /// Raw payload
    pub data: Bytes,
    /// Size the platform declared for the attachment
    pub original_size: u64,
}

impl StoredAttachment {
    /// Create a new stored attachment
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>, original_size: u64) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
            original_size,
        }
    }
}

/// A message as the audit store remembers it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub author_id: UserId,
    /// Author tag at the time of posting
    pub author_name: String,
    /// Current text body, replaced on edit
    pub content: String,
    /// Captured attachments, in declared order
    ///
    /// Attachments over the size cap or whose fetch failed are absent.
    pub attachments: Vec<StoredAttachment>,
    /// Number of attachments the platform reported
    pub declared_attachments: u32,
    /// When the last edit was applied
    pub edited_at: Option<DateTime<Utc>>,
}

impl StoredMessage {
    /// Create a message record without attachments
    pub fn new(
        guild_id: GuildId,
        channel_id: ChannelId,
        message_id: MessageId,
        author_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            message_id,
            author_id,
            author_name: String::new(),
            content: content.into(),
            attachments: Vec::new(),
            declared_attachments: 0,
            edited_at: None,
        }
    }

    /// Set the author tag
    pub fn with_author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = name.into();
        self
    }

    /// Attach captured bytes
    pub fn with_attachment(mut self, attachment: StoredAttachment) -> Self {
        self.attachments.push(attachment);
        self.declared_attachments = self.declared_attachments.max(self.attachments.len() as u32);
        self
    }

    /// Set the number of attachments the platform reported
    pub fn with_declared_attachments(mut self, count: u32) -> Self {
        self.declared_attachments = count;
        self
    }

    /// Creation instant, derived from the message id
    pub fn created_at(&self) -> DateTime<Utc> {
        self.message_id.created_at()
    }

    /// Whether the message carried any attachment, captured or not
    pub fn had_attachments(&self) -> bool {
        self.declared_attachments > 0 || !self.attachments.is_empty()
    }

    /// Replace the content if it differs
    ///
    /// Returns `true` when the record changed.
    pub fn apply_edit(&mut self, content: &str, edited_at: DateTime<Utc>) -> bool {
        if self.content == content {
            return false;
        }
        self.content = content.to_string();
        self.edited_at = Some(edited_at);
        true
    }
}

/// A membership snapshot
///
/// Every write replaces the whole record; there is no partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMember {
    pub guild_id: GuildId,
    pub user_id: UserId,
    /// Roles held by the member
    pub roles: BTreeSet<RoleId>,
    /// When the member joined the guild
    pub joined_at: Option<DateTime<Utc>>,
    /// Guild-specific nickname
    pub nick: Option<String>,
}

impl StoredMember {
    /// Create a member record without roles
    pub fn new(guild_id: GuildId, user_id: UserId) -> Self {
        Self {
            guild_id,
            user_id,
            roles: BTreeSet::new(),
            joined_at: None,
            nick: None,
        }
    }

    /// Set the held roles
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Set the join time
    pub fn with_joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = Some(joined_at);
        self
    }

    /// Set the nickname
    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = Some(nick.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snowflake::Snowflake;

    fn sample_message() -> StoredMessage {
        StoredMessage::new(Snowflake(1), Snowflake(2), Snowflake(100), Snowflake(42), "hi")
            .with_author_name("someone#0001")
    }

    #[test]
    fn test_apply_edit() {
        let mut msg = sample_message();
        let now = Utc::now();

        assert!(!msg.apply_edit("hi", now));
        assert!(msg.edited_at.is_none());

        assert!(msg.apply_edit("hi there", now));
        assert_eq!(msg.content, "hi there");
        assert_eq!(msg.edited_at, Some(now));
    }

    #[test]
    fn test_had_attachments_counts_skipped() {
        let msg = sample_message();
        assert!(!msg.had_attachments());

        let skipped = sample_message().with_declared_attachments(2);
        assert!(skipped.had_attachments());
        assert!(skipped.attachments.is_empty());

        let captured = sample_message().with_attachment(StoredAttachment::new(
            "a.png",
            vec![1u8, 2, 3],
            3,
        ));
        assert_eq!(captured.declared_attachments, 1);
        assert!(captured.had_attachments());
    }

    #[test]
    fn test_postcard_roundtrip_keeps_bytes() {
        let msg = sample_message()
            .with_attachment(StoredAttachment::new("blob.bin", vec![0u8, 255, 7, 0], 4));
        let bytes = postcard::to_allocvec(&msg).unwrap();
        let back: StoredMessage = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, msg);
        assert_eq!(&back.attachments[0].data[..], &[0u8, 255, 7, 0]);
    }

    #[test]
    fn test_member_roles_are_a_set() {
        let member = StoredMember::new(Snowflake(1), Snowflake(42))
            .with_roles([Snowflake(9), Snowflake(3), Snowflake(9)]);
        assert_eq!(member.roles.len(), 2);
        assert_eq!(member.roles.iter().next(), Some(&Snowflake(3)));
    }
}
