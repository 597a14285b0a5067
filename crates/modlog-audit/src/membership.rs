//! Membership snapshots

use tracing::{debug, instrument};

use modlog_core::{GuildId, StoredMember, UserId};

use crate::AuditLog;
use crate::error::AuditResult;

impl AuditLog {
    /// Store a membership snapshot, replacing any previous one
    pub async fn record_member(&self, member: StoredMember) -> AuditResult<()> {
        self.blocking(move |storage| storage.members().put(&member))
            .await
    }

    /// Store many membership snapshots at once
    #[instrument(skip_all, fields(count = members.len()))]
    pub async fn record_members(&self, members: Vec<StoredMember>) -> AuditResult<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        self.blocking(move |storage| storage.members().put_many(&members))
            .await
    }

    /// Forget a member, returning the record it held
    #[instrument(skip(self))]
    pub async fn remove_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> AuditResult<Option<StoredMember>> {
        let member = self
            .blocking(move |storage| storage.members().take(guild, user))
            .await?;
        if member.is_none() {
            debug!("No member record to remove");
        }
        Ok(member)
    }

    /// A member record, failing with `NotFound` when absent
    pub async fn member(&self, guild: GuildId, user: UserId) -> AuditResult<StoredMember> {
        self.blocking(move |storage| storage.members().get(guild, user))
            .await
    }

    /// All member records of a guild
    pub async fn guild_members(&self, guild: GuildId) -> AuditResult<Vec<StoredMember>> {
        self.blocking(move |storage| storage.members().list_guild(guild))
            .await
    }
}
