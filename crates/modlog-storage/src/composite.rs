//! Composite storage holding both record stores
//!
//! ```text
//! <data_dir>/modlog.redb
//!   ├─ messages  {guild}\0{channel}\0{message} → StoredMessage
//!   └─ members   {guild}\0{user}               → StoredMember
//! ```

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::StorageError;
use crate::members::MemberStore;
use crate::messages::MessageStore;
use crate::tables::{RedbStorage, StorageConfig};

/// Both record stores over one database file
#[derive(Clone)]
pub struct AuditStorage {
    redb: Arc<RedbStorage>,
    messages: MessageStore,
    members: MemberStore,
}

impl AuditStorage {
    /// Open or create the database and its tables
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let redb = Arc::new(RedbStorage::open(config)?);
        info!("Audit storage ready");
        Ok(Self::from_redb(redb))
    }

    /// Build the stores over an already opened database
    pub fn from_redb(redb: Arc<RedbStorage>) -> Self {
        Self {
            messages: MessageStore::new(Arc::clone(&redb)),
            members: MemberStore::new(Arc::clone(&redb)),
            redb,
        }
    }

    /// Message record store
    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// Member record store
    pub fn members(&self) -> &MemberStore {
        &self.members
    }

    /// Storage configuration
    pub fn config(&self) -> &StorageConfig {
        self.redb.config()
    }

    /// Release this handle
    ///
    /// The database file closes once the last clone of the storage (and of
    /// any store taken from it) is dropped.
    pub fn close(self) {
        info!(
            path = %self.redb.config().db_path.display(),
            "Closing audit storage"
        );
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlog_core::{Snowflake, StoredMember, StoredMessage};
    use tempfile::TempDir;

    #[test]
    fn test_reopen_persists_records() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::in_dir(temp.path());

        {
            let storage = AuditStorage::open(config.clone()).unwrap();
            storage
                .messages()
                .put(&StoredMessage::new(
                    Snowflake(1),
                    Snowflake(2),
                    Snowflake(3),
                    Snowflake(4),
                    "kept",
                ))
                .unwrap();
            storage
                .members()
                .put(&StoredMember::new(Snowflake(1), Snowflake(4)))
                .unwrap();
            storage.close();
        }

        let storage = AuditStorage::open(config).unwrap();
        let message = storage
            .messages()
            .get(Snowflake(1), Snowflake(2), Snowflake(3))
            .unwrap();
        assert_eq!(message.content, "kept");
        assert!(storage.members().find(Snowflake(1), Snowflake(4)).unwrap().is_some());
        assert!(storage.config().db_path.ends_with("modlog.redb"));
    }
}
