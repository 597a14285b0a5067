//! Compact JSON views for command output
//!
//! Stored records carry raw attachment bytes. Views replace them with the
//! filename and size.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use modlog_core::{ChannelId, GuildId, MessageId, Snowflake, StoredMessage};

use crate::dispatch::ModerationRecord;

#[derive(Debug, Serialize)]
pub struct AttachmentView<'a> {
    pub filename: &'a str,
    pub size: usize,
}

/// A message without its attachment payloads
#[derive(Debug, Serialize)]
pub struct MessageView<'a> {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: Snowflake,
    pub author_name: &'a str,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub content: &'a str,
    pub declared_attachments: u32,
    pub attachments: Vec<AttachmentView<'a>>,
}

impl<'a> From<&'a StoredMessage> for MessageView<'a> {
    fn from(message: &'a StoredMessage) -> Self {
        Self {
            id: message.message_id,
            channel_id: message.channel_id,
            author_id: message.author_id,
            author_name: &message.author_name,
            created_at: message.created_at(),
            edited_at: message.edited_at,
            content: &message.content,
            declared_attachments: message.declared_attachments,
            attachments: message
                .attachments
                .iter()
                .map(|a| AttachmentView {
                    filename: &a.filename,
                    size: a.data.len(),
                })
                .collect(),
        }
    }
}

/// Message-carrying records with their messages replaced by views
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RecordView<'a> {
    MessageDeleted {
        message: MessageView<'a>,
    },
    MessagesBulkDeleted {
        guild: GuildId,
        channel: ChannelId,
        messages: Vec<MessageView<'a>>,
        missing: &'a [MessageId],
    },
    MessageEdited {
        before: MessageView<'a>,
        after: MessageView<'a>,
    },
}

/// JSON form of a record, with messages shown as [`MessageView`]s
///
/// Ban histories need no rewriting: transcripts never serialize attachment
/// bytes.
pub fn record_json(record: &ModerationRecord) -> serde_json::Result<Value> {
    let view = match record {
        ModerationRecord::MessageDeleted { message } => RecordView::MessageDeleted {
            message: message.into(),
        },
        ModerationRecord::MessagesBulkDeleted {
            guild,
            channel,
            messages,
            missing,
        } => RecordView::MessagesBulkDeleted {
            guild: *guild,
            channel: *channel,
            messages: messages.iter().map(MessageView::from).collect(),
            missing,
        },
        ModerationRecord::MessageEdited { before, after } => RecordView::MessageEdited {
            before: before.into(),
            after: after.into(),
        },
        other => return serde_json::to_value(other),
    };
    serde_json::to_value(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlog_core::{StoredAttachment, UserInfo};

    fn message_with_payload() -> StoredMessage {
        StoredMessage::new(Snowflake(1), Snowflake(2), Snowflake(100), Snowflake(42), "look")
            .with_author_name("someone")
            .with_attachment(StoredAttachment::new("cat.png", vec![7u8; 4096], 4096))
            .with_declared_attachments(1)
    }

    #[test]
    fn test_deleted_message_omits_payload() {
        let record = ModerationRecord::MessageDeleted {
            message: message_with_payload(),
        };
        let value = record_json(&record).unwrap();

        assert_eq!(value["kind"], "message_deleted");
        assert_eq!(value["message"]["id"], "100");
        assert_eq!(value["message"]["attachments"][0]["filename"], "cat.png");
        assert_eq!(value["message"]["attachments"][0]["size"], 4096);
        assert!(value["message"]["attachments"][0].get("data").is_none());
        assert!(value.to_string().len() < 1024);
    }

    #[test]
    fn test_bulk_and_edit_use_views() {
        let bulk = ModerationRecord::MessagesBulkDeleted {
            guild: Snowflake(1),
            channel: Snowflake(2),
            messages: vec![message_with_payload()],
            missing: vec![Snowflake(5)],
        };
        let value = record_json(&bulk).unwrap();
        assert_eq!(value["kind"], "messages_bulk_deleted");
        assert_eq!(value["missing"][0], "5");
        assert_eq!(value["messages"][0]["attachments"][0]["size"], 4096);

        let edited = ModerationRecord::MessageEdited {
            before: message_with_payload(),
            after: message_with_payload(),
        };
        let value = record_json(&edited).unwrap();
        assert_eq!(value["before"]["content"], "look");
        assert!(value["after"]["attachments"][0].get("data").is_none());
    }

    #[test]
    fn test_other_records_unchanged() {
        let record = ModerationRecord::UserUnbanned {
            guild: Snowflake(1),
            user: UserInfo::new(Snowflake(42), "someone"),
        };
        assert_eq!(
            record_json(&record).unwrap(),
            serde_json::to_value(&record).unwrap()
        );
    }
}
