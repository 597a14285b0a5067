//! Typed event dispatch
//!
//! Each [`GatewayEvent`] variant has one handler. Handlers mutate the stores
//! through [`AuditLog`] and emit [`ModerationRecord`]s to a [`RecordSink`],
//! the boundary to whatever renders or posts the logs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use modlog_core::{
    ChannelId, ChannelInfo, GatewayEvent, GuildId, IncomingMessage, MemberSnapshot, MessageId,
    StaticChannelDirectory, StoredMember, StoredMessage, UserInfo,
};

use crate::AuditLog;
use crate::ban_context::BanContext;
use crate::error::AuditResult;
use crate::ingest::EditOutcome;

/// Structured moderation log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModerationRecord {
    /// A recorded message was deleted
    MessageDeleted { message: StoredMessage },

    /// Several messages were deleted at once
    MessagesBulkDeleted {
        guild: GuildId,
        channel: ChannelId,
        /// Recorded messages, oldest first
        messages: Vec<StoredMessage>,
        /// Deleted ids with no record
        missing: Vec<MessageId>,
    },

    /// A recorded message changed content
    MessageEdited {
        before: StoredMessage,
        after: StoredMessage,
    },

    /// A user joined; account age helps spot throwaway accounts
    MemberJoined {
        guild: GuildId,
        user: UserInfo,
        account_created: DateTime<Utc>,
        account_age_days: i64,
    },

    /// A member with a stored record left or was removed
    MemberLeft {
        guild: GuildId,
        user: UserInfo,
        member: StoredMember,
    },

    /// A user was banned
    ///
    /// `hackban` means the user was never a recorded member, in which case
    /// no history is collected.
    UserBanned {
        guild: GuildId,
        user: UserInfo,
        hackban: bool,
        history: Option<BanContext>,
    },

    /// A ban was lifted
    UserUnbanned { guild: GuildId, user: UserInfo },

    /// The guild arrived with a partial member list; the gateway must
    /// request member chunks
    MembersRequested {
        guild: GuildId,
        member_count: u64,
        received: usize,
    },
}

impl ModerationRecord {
    /// The guild this record belongs to
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::MessageDeleted { message } => message.guild_id,
            Self::MessageEdited { after, .. } => after.guild_id,
            Self::MessagesBulkDeleted { guild, .. }
            | Self::MemberJoined { guild, .. }
            | Self::MemberLeft { guild, .. }
            | Self::UserBanned { guild, .. }
            | Self::UserUnbanned { guild, .. }
            | Self::MembersRequested { guild, .. } => *guild,
        }
    }
}

/// Receiver of moderation records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver one record
    async fn emit(&self, record: ModerationRecord);
}

/// Sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<ModerationRecord>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far
    pub async fn records(&self) -> Vec<ModerationRecord> {
        self.records.lock().await.clone()
    }

    /// Remove and return everything emitted so far
    pub async fn take(&self) -> Vec<ModerationRecord> {
        std::mem::take(&mut *self.records.lock().await)
    }
}

#[async_trait]
impl RecordSink for CollectingSink {
    async fn emit(&self, record: ModerationRecord) {
        self.records.lock().await.push(record);
    }
}

#[async_trait]
impl RecordSink for mpsc::UnboundedSender<ModerationRecord> {
    async fn emit(&self, record: ModerationRecord) {
        if self.send(record).is_err() {
            debug!("Record receiver dropped");
        }
    }
}

/// Routes gateway events to their handlers
pub struct EventDispatcher {
    audit: Arc<AuditLog>,
    sink: Arc<dyn RecordSink>,
    channel_cache: Option<Arc<StaticChannelDirectory>>,
}

impl EventDispatcher {
    /// Create a dispatcher over a shared audit log
    pub fn new(audit: Arc<AuditLog>, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            audit,
            sink,
            channel_cache: None,
        }
    }

    /// Keep `cache` in sync with the channel lists of guild-create events
    pub fn with_channel_cache(mut self, cache: Arc<StaticChannelDirectory>) -> Self {
        self.channel_cache = Some(cache);
        self
    }

    /// The audit log events are applied to
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Handle one event
    #[instrument(skip_all, fields(kind = event.kind(), guild = %event.guild_id()))]
    pub async fn dispatch(&self, event: GatewayEvent) -> AuditResult<()> {
        match event {
            GatewayEvent::GuildCreate {
                guild_id,
                member_count,
                members,
                channels,
            } => {
                self.on_guild_create(guild_id, member_count, members, channels)
                    .await
            }
            GatewayEvent::MessageCreate(message) => self.on_message_create(message).await,
            GatewayEvent::MessageUpdate {
                guild_id,
                channel_id,
                id,
                content,
            } => self.on_message_update(guild_id, channel_id, id, content).await,
            GatewayEvent::MessageDelete {
                guild_id,
                channel_id,
                id,
            } => self.on_message_delete(guild_id, channel_id, id).await,
            GatewayEvent::MessageDeleteBulk {
                guild_id,
                channel_id,
                ids,
            } => self.on_message_delete_bulk(guild_id, channel_id, ids).await,
            GatewayEvent::MemberAdd(snapshot) => self.on_member_add(snapshot).await,
            GatewayEvent::MemberUpdate(snapshot) => self.on_member_update(snapshot).await,
            GatewayEvent::MemberRemove { guild_id, user } => {
                self.on_member_remove(guild_id, user).await
            }
            GatewayEvent::MembersChunk { guild_id, members } => {
                self.on_members_chunk(guild_id, members).await
            }
            GatewayEvent::BanAdd { guild_id, user } => self.on_ban_add(guild_id, user).await,
            GatewayEvent::BanRemove { guild_id, user } => {
                self.on_ban_remove(guild_id, user).await
            }
        }
    }

    /// Consume events until the channel closes, one task per event
    ///
    /// Handler errors are logged and do not stop the loop. Events for the
    /// same message may be handled concurrently, so no ordering between them
    /// is guaranteed.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<GatewayEvent>) {
        let mut tasks = JoinSet::new();

        while let Some(event) = rx.recv().await {
            let dispatcher = Arc::clone(&self);
            tasks.spawn(async move {
                let kind = event.kind();
                if let Err(e) = dispatcher.dispatch(event).await {
                    warn!(kind, error = %e, "Event handler failed");
                }
            });

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    warn!(error = %e, "Event task aborted");
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Event task aborted");
            }
        }
        info!("Event stream closed");
    }

    async fn on_guild_create(
        &self,
        guild: GuildId,
        member_count: u64,
        members: Vec<MemberSnapshot>,
        channels: Vec<ChannelInfo>,
    ) -> AuditResult<()> {
        if let Some(cache) = &self.channel_cache {
            cache.set_guild(guild, channels);
        }

        if (members.len() as u64) < member_count {
            debug!(received = members.len(), member_count, "Partial member list");
            self.sink
                .emit(ModerationRecord::MembersRequested {
                    guild,
                    member_count,
                    received: members.len(),
                })
                .await;
            return Ok(());
        }

        let records = members.iter().map(MemberSnapshot::to_record).collect();
        let stored = self.audit.record_members(records).await?;
        debug!(stored, "Loaded guild members");
        Ok(())
    }

    async fn on_message_create(&self, message: IncomingMessage) -> AuditResult<()> {
        self.audit.record_message(&message).await?;
        Ok(())
    }

    async fn on_message_update(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> AuditResult<()> {
        if let EditOutcome::Edited { before, after } = self
            .audit
            .record_edit(guild, channel, message, &content)
            .await?
        {
            self.sink
                .emit(ModerationRecord::MessageEdited { before, after })
                .await;
        }
        Ok(())
    }

    async fn on_message_delete(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    ) -> AuditResult<()> {
        match self.audit.deleted_message(guild, channel, message).await? {
            Some(message) => {
                self.sink
                    .emit(ModerationRecord::MessageDeleted { message })
                    .await
            }
            None => debug!(%message, "Deleted message was never recorded"),
        }
        Ok(())
    }

    async fn on_message_delete_bulk(
        &self,
        guild: GuildId,
        channel: ChannelId,
        ids: Vec<MessageId>,
    ) -> AuditResult<()> {
        let deletion = self
            .audit
            .bulk_deleted_messages(guild, channel, &ids)
            .await?;

        self.sink
            .emit(ModerationRecord::MessagesBulkDeleted {
                guild,
                channel,
                messages: deletion.messages,
                missing: deletion.missing,
            })
            .await;
        Ok(())
    }

    async fn on_member_add(&self, snapshot: MemberSnapshot) -> AuditResult<()> {
        self.audit.record_member(snapshot.to_record()).await?;

        let now = self.audit.clock.now_utc();
        let created = snapshot.user.id.created_at();
        self.sink
            .emit(ModerationRecord::MemberJoined {
                guild: snapshot.guild_id,
                account_created: created,
                account_age_days: (now - created).num_days(),
                user: snapshot.user,
            })
            .await;
        Ok(())
    }

    async fn on_member_update(&self, snapshot: MemberSnapshot) -> AuditResult<()> {
        self.audit.record_member(snapshot.to_record()).await
    }

    async fn on_member_remove(&self, guild: GuildId, user: UserInfo) -> AuditResult<()> {
        match self.audit.remove_member(guild, user.id).await? {
            Some(member) => {
                self.sink
                    .emit(ModerationRecord::MemberLeft {
                        guild,
                        user,
                        member,
                    })
                    .await
            }
            None => debug!(user = %user.id, "Departing user had no member record"),
        }
        Ok(())
    }

    async fn on_members_chunk(
        &self,
        guild: GuildId,
        members: Vec<MemberSnapshot>,
    ) -> AuditResult<()> {
        let records = members.iter().map(MemberSnapshot::to_record).collect();
        let stored = self.audit.record_members(records).await?;
        debug!(%guild, stored, "Stored member chunk");
        Ok(())
    }

    async fn on_ban_add(&self, guild: GuildId, user: UserInfo) -> AuditResult<()> {
        let record = match self.audit.member(guild, user.id).await {
            Ok(_) => {
                let history = self.audit.ban_context(guild, user.id).await;
                ModerationRecord::UserBanned {
                    guild,
                    user,
                    hackban: false,
                    history: Some(history),
                }
            }
            Err(e) if e.is_not_found() => ModerationRecord::UserBanned {
                guild,
                user,
                hackban: true,
                history: None,
            },
            Err(e) => return Err(e),
        };

        self.sink.emit(record).await;
        Ok(())
    }

    async fn on_ban_remove(&self, guild: GuildId, user: UserInfo) -> AuditResult<()> {
        self.sink
            .emit(ModerationRecord::UserUnbanned { guild, user })
            .await;
        Ok(())
    }
}
