//! Per-channel message transcripts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use modlog_core::{ChannelId, GuildId, MessageId, StoredAttachment, StoredMessage, UserId};

/// One message in a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub message_id: MessageId,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
    /// Derived from the message id
    pub created_at: DateTime<Utc>,
    /// Attachments the platform reported, captured or not
    pub attachment_count: u32,
    /// Captured attachment bytes; never serialized
    #[serde(skip)]
    pub attachments: Vec<StoredAttachment>,
}

impl TranscriptLine {
    /// Build a line from a stored message
    pub fn from_message(message: StoredMessage) -> Self {
        let attachment_count = message
            .declared_attachments
            .max(message.attachments.len() as u32);
        Self {
            created_at: message.created_at(),
            message_id: message.message_id,
            author_id: message.author_id,
            author_name: message.author_name,
            content: message.content,
            attachment_count,
            attachments: message.attachments,
        }
    }

    /// Whether the message carried any attachment
    pub fn had_attachments(&self) -> bool {
        self.attachment_count > 0
    }
}

/// A user's messages in one channel, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub user: UserId,
    pub lines: Vec<TranscriptLine>,
}

impl Transcript {
    /// Build a transcript from messages already in creation order
    pub fn new(
        guild: GuildId,
        channel: ChannelId,
        user: UserId,
        messages: impl IntoIterator<Item = StoredMessage>,
    ) -> Self {
        Self {
            guild,
            channel,
            user,
            lines: messages.into_iter().map(TranscriptLine::from_message).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Captured attachments with the id of the message carrying them
    pub fn attachments(&self) -> impl Iterator<Item = (MessageId, &StoredAttachment)> {
        self.lines
            .iter()
            .flat_map(|line| line.attachments.iter().map(move |a| (line.message_id, a)))
    }

    /// File name for the rendered transcript
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.txt", self.guild, self.channel, self.user)
    }

    /// Plain-text transcript body
    ///
    /// ```text
    /// Log for user: someone (42); channel: general (1)
    ///
    /// Content: hi
    ///
    /// Content: look
    /// Message had attachment
    /// ```
    pub fn render_text(&self, user_label: &str, channel_label: &str) -> String {
        let mut text = format!(
            "Log for user: {user_label} ({}); channel: {channel_label} ({})\n",
            self.user, self.channel
        );
        for line in &self.lines {
            text.push_str(&format!("\nContent: {}\n", line.content));
            if line.had_attachments() {
                text.push_str("Message had attachment\n");
            }
        }
        text
    }
}

/// Plain-text body for a bulk deletion
///
/// `messages` are expected in creation order.
pub fn render_bulk_deletion(
    channel: ChannelId,
    at: DateTime<Utc>,
    messages: &[StoredMessage],
) -> String {
    let mut text = format!("{channel} - {}\n\n\n", at.format("%a, %d %b %Y %H:%M:%S UTC"));
    for message in messages {
        text.push_str(&format!(
            "\nUser: {} ({})\nContent: {}\n",
            message.author_name, message.author_id, message.content
        ));
        if message.had_attachments() {
            text.push_str("Message had attachment\n");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlog_core::Snowflake;

    fn message(id: u64, content: &str) -> StoredMessage {
        StoredMessage::new(Snowflake(1), Snowflake(2), Snowflake(id), Snowflake(42), content)
            .with_author_name("someone")
    }

    #[test]
    fn test_render_text() {
        let transcript = Transcript::new(
            Snowflake(1),
            Snowflake(2),
            Snowflake(42),
            vec![
                message(100, "hi"),
                message(200, "look").with_declared_attachments(1),
            ],
        );

        assert_eq!(
            transcript.render_text("someone", "general"),
            "Log for user: someone (42); channel: general (2)\n\
             \nContent: hi\n\
             \nContent: look\nMessage had attachment\n"
        );
        assert_eq!(transcript.file_name(), "1_2_42.txt");
    }

    #[test]
    fn test_attachments_exposed_not_serialized() {
        let with_file = message(100, "file").with_attachment(StoredAttachment::new(
            "a.png",
            vec![1u8, 2],
            2,
        ));
        let transcript = Transcript::new(Snowflake(1), Snowflake(2), Snowflake(42), vec![with_file]);

        let attachments: Vec<_> = transcript.attachments().collect();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].0, Snowflake(100));
        assert_eq!(transcript.lines[0].attachment_count, 1);

        let json = serde_json::to_value(&transcript).unwrap();
        assert!(json["lines"][0].get("attachments").is_none());
        assert_eq!(json["lines"][0]["message_id"], "100");
    }

    #[test]
    fn test_render_bulk_deletion() {
        let at = DateTime::from_timestamp(0, 0).unwrap();
        let text = render_bulk_deletion(
            Snowflake(2),
            at,
            &[message(1, "a"), message(2, "b").with_declared_attachments(2)],
        );
        assert!(text.starts_with("2 - Thu, 01 Jan 1970 00:00:00 UTC\n\n\n"));
        assert!(text.contains("\nUser: someone (42)\nContent: a\n"));
        assert!(text.ends_with("Content: b\nMessage had attachment\n"));
    }
}
