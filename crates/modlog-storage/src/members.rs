//! Member record store
//!
//! Every write replaces the whole record under `{guild}\0{user}`.

use std::sync::Arc;

use tracing::debug;

use modlog_core::{GuildId, StoredMember, UserId};

use crate::error::StorageError;
use crate::keys::{guild_prefix, member_key};
use crate::tables::{MEMBERS, RedbStorage};

fn encode(member: &StoredMember) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(member).map_err(|e| StorageError::serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<StoredMember, StorageError> {
    postcard::from_bytes(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
}

/// Durable store of membership snapshots
#[derive(Clone)]
pub struct MemberStore {
    storage: Arc<RedbStorage>,
}

impl MemberStore {
    /// Create a member store over shared storage
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// Insert or replace a member record
    pub fn put(&self, member: &StoredMember) -> Result<(), StorageError> {
        let key = member_key(member.guild_id, member.user_id);
        let value = encode(member)?;

        self.storage.put(MEMBERS, &key, &value)?;
        debug!(
            guild = %member.guild_id,
            user = %member.user_id,
            roles = member.roles.len(),
            "Stored member"
        );
        Ok(())
    }

    /// Insert or replace many member records in one transaction
    ///
    /// Returns the number of records written.
    pub fn put_many(&self, members: &[StoredMember]) -> Result<usize, StorageError> {
        let entries = members
            .iter()
            .map(|m| Ok((member_key(m.guild_id, m.user_id), encode(m)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        self.storage.put_batch(MEMBERS, &entries)?;
        debug!(count = entries.len(), "Stored member batch");
        Ok(entries.len())
    }

    /// Get a member record, failing with `NotFound` when absent
    pub fn get(&self, guild: GuildId, user: UserId) -> Result<StoredMember, StorageError> {
        self.find(guild, user)?
            .ok_or_else(|| StorageError::not_found(format!("member {guild}/{user}")))
    }

    /// Get a member record if present
    pub fn find(&self, guild: GuildId, user: UserId) -> Result<Option<StoredMember>, StorageError> {
        self.storage
            .get(MEMBERS, &member_key(guild, user))?
            .map(|value| decode(&value))
            .transpose()
    }

    /// Remove a member record
    ///
    /// Returns `false` if no record existed.
    pub fn delete(&self, guild: GuildId, user: UserId) -> Result<bool, StorageError> {
        let removed = self.storage.delete(MEMBERS, &member_key(guild, user))?;
        debug!(%guild, %user, removed, "Deleted member");
        Ok(removed)
    }

    /// Remove a member record, returning it if one existed
    pub fn take(&self, guild: GuildId, user: UserId) -> Result<Option<StoredMember>, StorageError> {
        let taken = self
            .storage
            .take(MEMBERS, &member_key(guild, user))?
            .map(|value| decode(&value))
            .transpose()?;
        debug!(%guild, %user, removed = taken.is_some(), "Took member");
        Ok(taken)
    }

    /// All member records of a guild, ordered by user id
    pub fn list_guild(&self, guild: GuildId) -> Result<Vec<StoredMember>, StorageError> {
        let entries = self.storage.scan_prefix(MEMBERS, &guild_prefix(guild))?;

        let mut members = entries
            .iter()
            .map(|(_, value)| decode(value))
            .collect::<Result<Vec<_>, _>>()?;
        members.sort_by_key(|m| m.user_id);
        Ok(members)
    }

    /// Number of member records in a guild
    pub fn count_guild(&self, guild: GuildId) -> Result<usize, StorageError> {
        self.storage.count_prefix(MEMBERS, &guild_prefix(guild))
    }
}
