//! Inbound chat-platform events
//!
//! The gateway layer translates raw dispatch payloads into this closed set of
//! variants. Only the fields the audit store needs are modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::StoredMember;
use crate::snowflake::{ChannelId, GuildId, MessageId, RoleId, UserId};
use crate::traits::ChannelInfo;

/// A platform user as seen in an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    /// Display tag, e.g. `name` or `name#1234`
    #[serde(default)]
    pub name: String,
    /// Whether this is an automated account
    #[serde(default)]
    pub bot: bool,
}

impl UserInfo {
    /// Create a human user
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            bot: false,
        }
    }

    /// Mark as an automated account
    pub fn with_bot(mut self, bot: bool) -> Self {
        self.bot = bot;
        self
    }
}

/// Attachment metadata as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub url: String,
    /// Declared payload size in bytes
    pub size: u64,
}

impl AttachmentInfo {
    pub fn new(filename: impl Into<String>, url: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            size,
        }
    }
}

/// A newly posted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub id: MessageId,
    pub author: UserInfo,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
}

/// A membership snapshot carried by join, update and chunk events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub guild_id: GuildId,
    pub user: UserInfo,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nick: Option<String>,
}

impl MemberSnapshot {
    /// Convert into the record the member store keeps
    pub fn to_record(&self) -> StoredMember {
        StoredMember {
            guild_id: self.guild_id,
            user_id: self.user.id,
            roles: self.roles.iter().copied().collect(),
            joined_at: self.joined_at,
            nick: self.nick.clone(),
        }
    }
}

/// Events that drive store mutations and moderation records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEvent {
    /// A guild became available, with its channels and (possibly partial) members
    GuildCreate {
        guild_id: GuildId,
        member_count: u64,
        #[serde(default)]
        members: Vec<MemberSnapshot>,
        #[serde(default)]
        channels: Vec<ChannelInfo>,
    },

    MessageCreate(IncomingMessage),

    MessageUpdate {
        guild_id: GuildId,
        channel_id: ChannelId,
        id: MessageId,
        #[serde(default)]
        content: String,
    },

    MessageDelete {
        guild_id: GuildId,
        channel_id: ChannelId,
        id: MessageId,
    },

    MessageDeleteBulk {
        guild_id: GuildId,
        channel_id: ChannelId,
        ids: Vec<MessageId>,
    },

    #[serde(rename = "GUILD_MEMBER_ADD")]
    MemberAdd(MemberSnapshot),

    #[serde(rename = "GUILD_MEMBER_UPDATE")]
    MemberUpdate(MemberSnapshot),

    #[serde(rename = "GUILD_MEMBER_REMOVE")]
    MemberRemove { guild_id: GuildId, user: UserInfo },

    #[serde(rename = "GUILD_MEMBERS_CHUNK")]
    MembersChunk {
        guild_id: GuildId,
        members: Vec<MemberSnapshot>,
    },

    #[serde(rename = "GUILD_BAN_ADD")]
    BanAdd { guild_id: GuildId, user: UserInfo },

    #[serde(rename = "GUILD_BAN_REMOVE")]
    BanRemove { guild_id: GuildId, user: UserInfo },
}

impl GatewayEvent {
    /// The guild this event belongs to
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::GuildCreate { guild_id, .. } => *guild_id,
            Self::MessageCreate(msg) => msg.guild_id,
            Self::MessageUpdate { guild_id, .. } => *guild_id,
            Self::MessageDelete { guild_id, .. } => *guild_id,
            Self::MessageDeleteBulk { guild_id, .. } => *guild_id,
            Self::MemberAdd(member) => member.guild_id,
            Self::MemberUpdate(member) => member.guild_id,
            Self::MemberRemove { guild_id, .. } => *guild_id,
            Self::MembersChunk { guild_id, .. } => *guild_id,
            Self::BanAdd { guild_id, .. } => *guild_id,
            Self::BanRemove { guild_id, .. } => *guild_id,
        }
    }

    /// Dispatch name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GuildCreate { .. } => "GUILD_CREATE",
            Self::MessageCreate(_) => "MESSAGE_CREATE",
            Self::MessageUpdate { .. } => "MESSAGE_UPDATE",
            Self::MessageDelete { .. } => "MESSAGE_DELETE",
            Self::MessageDeleteBulk { .. } => "MESSAGE_DELETE_BULK",
            Self::MemberAdd(_) => "GUILD_MEMBER_ADD",
            Self::MemberUpdate(_) => "GUILD_MEMBER_UPDATE",
            Self::MemberRemove { .. } => "GUILD_MEMBER_REMOVE",
            Self::MembersChunk { .. } => "GUILD_MEMBERS_CHUNK",
            Self::BanAdd { .. } => "GUILD_BAN_ADD",
            Self::BanRemove { .. } => "GUILD_BAN_REMOVE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snowflake::Snowflake;

    #[test]
    fn test_message_create_from_json() {
        let json = r#"{
            "t": "MESSAGE_CREATE",
            "d": {
                "guild_id": "1",
                "channel_id": "2",
                "id": "100",
                "author": {"id": "42", "name": "someone"},
                "content": "hi",
                "attachments": [{"filename": "a.png", "url": "http://x/a.png", "size": 10}]
            }
        }"#;

        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), "MESSAGE_CREATE");
        assert_eq!(event.guild_id(), Snowflake(1));

        match event {
            GatewayEvent::MessageCreate(msg) => {
                assert_eq!(msg.id, Snowflake(100));
                assert!(!msg.author.bot);
                assert_eq!(msg.attachments.len(), 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let event = GatewayEvent::BanAdd {
            guild_id: Snowflake(1),
            user: UserInfo::new(Snowflake(42), "x"),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["t"], event.kind());

        let chunk = GatewayEvent::MembersChunk {
            guild_id: Snowflake(1),
            members: Vec::new(),
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["t"], chunk.kind());
    }

    #[test]
    fn test_snapshot_to_record() {
        let snapshot = MemberSnapshot {
            guild_id: Snowflake(1),
            user: UserInfo::new(Snowflake(42), "x"),
            roles: vec![Snowflake(5), Snowflake(5), Snowflake(4)],
            joined_at: None,
            nick: Some("nick".into()),
        };
        let record = snapshot.to_record();
        assert_eq!(record.user_id, Snowflake(42));
        assert_eq!(record.roles.len(), 2);
        assert_eq!(record.nick.as_deref(), Some("nick"));
    }
}
