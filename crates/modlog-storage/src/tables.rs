//! redb table definitions and storage manager
//!
//! Defines all tables used by the audit store. Every mutation runs in its own
//! write transaction; every read or scan runs against one read snapshot, so a
//! reader never observes a partially written value.

use std::path::PathBuf;
use std::sync::Arc;

use redb::{Builder, Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::StorageError;

/// Type alias for scan results to simplify complex type
pub type ScanResults = Vec<(Vec<u8>, Vec<u8>)>;

// Table definitions
// Key: {guild}\0{channel}\0{message}, Value: postcard StoredMessage
pub const MESSAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages");

// Key: {guild}\0{user}, Value: postcard StoredMember
pub const MEMBERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("members");

/// Configuration for redb storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Page cache size in bytes
    pub cache_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/modlog.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl StorageConfig {
    /// Place the database file inside `data_dir`
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: data_dir.into().join("modlog.redb"),
            ..Default::default()
        }
    }
}

/// Main redb storage manager
pub struct RedbStorage {
    db: Arc<Database>,
    config: StorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Builder::new()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(StorageError::database)?;

        info!("Opened redb database");

        let storage = Self {
            db: Arc::new(db),
            config,
        };

        storage.init_tables()?;

        Ok(storage)
    }

    /// Create tables that don't exist yet
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        write_txn
            .open_table(MESSAGES)
            .map_err(StorageError::database)?;
        write_txn
            .open_table(MEMBERS)
            .map_err(StorageError::database)?;

        write_txn.commit().map_err(StorageError::database)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get a reference to the database
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Put a key-value pair in a table
    pub fn put(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            table.insert(key, value).map_err(StorageError::database)?;
        }

        write_txn.commit().map_err(StorageError::database)?;

        Ok(())
    }

    /// Put many key-value pairs in one write transaction
    pub fn put_batch(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        entries: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            for (key, value) in entries {
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(StorageError::database)?;
            }
        }

        write_txn.commit().map_err(StorageError::database)?;

        Ok(())
    }

    /// Get a value from a table
    pub fn get(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn.open_table(table).map_err(StorageError::database)?;

        let value = table
            .get(key)
            .map_err(StorageError::database)?
            .map(|v| v.value().to_vec());

        Ok(value)
    }

    /// Get several values from one read snapshot
    ///
    /// The result is aligned with `keys`.
    pub fn get_many(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Option<Vec<u8>>>, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn.open_table(table).map_err(StorageError::database)?;

        keys.iter()
            .map(|key| {
                table
                    .get(key.as_slice())
                    .map(|v| v.map(|v| v.value().to_vec()))
                    .map_err(StorageError::database)
            })
            .collect()
    }

    /// Delete a key from a table
    ///
    /// Returns whether a value was removed.
    pub fn delete(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        let removed = {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            table.remove(key).map_err(StorageError::database)?.is_some()
        };

        write_txn.commit().map_err(StorageError::database)?;

        Ok(removed)
    }

    /// Remove a key and return the value it held, in one write transaction
    pub fn take(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        let previous = {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            table
                .remove(key)
                .map_err(StorageError::database)?
                .map(|v| v.value().to_vec())
        };

        write_txn.commit().map_err(StorageError::database)?;

        Ok(previous)
    }

    /// Read-modify-write a single key in one write transaction
    ///
    /// `f` receives the current value and returns the value to write (or
    /// `None` to leave the key untouched) plus an outcome for the caller. If
    /// `f` fails the transaction is aborted.
    pub fn modify<T, F>(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
        f: F,
    ) -> Result<T, StorageError>
    where
        F: FnOnce(Option<Vec<u8>>) -> Result<(Option<Vec<u8>>, T), StorageError>,
    {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        let outcome = {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            let current = table
                .get(key)
                .map_err(StorageError::database)?
                .map(|v| v.value().to_vec());

            let (next, outcome) = f(current)?;
            if let Some(next) = next {
                table
                    .insert(key, next.as_slice())
                    .map_err(StorageError::database)?;
            }
            outcome
        };

        write_txn.commit().map_err(StorageError::database)?;

        Ok(outcome)
    }

    /// Iterate over all entries in a table with a prefix
    pub fn scan_prefix(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        prefix: &[u8],
    ) -> Result<ScanResults, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn.open_table(table).map_err(StorageError::database)?;

        let mut results = Vec::new();

        // Keys sharing a prefix are contiguous, so stop at the first miss
        let range = table.range(prefix..).map_err(StorageError::database)?;

        for entry in range {
            let (key, value) = entry.map_err(StorageError::database)?;
            let key_bytes = key.value();

            if !key_bytes.starts_with(prefix) {
                break;
            }

            results.push((key_bytes.to_vec(), value.value().to_vec()));
        }

        Ok(results)
    }

    /// Collect only the keys with a prefix
    pub fn scan_keys(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        prefix: &[u8],
    ) -> Result<Vec<Vec<u8>>, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn.open_table(table).map_err(StorageError::database)?;

        let mut keys = Vec::new();
        let range = table.range(prefix..).map_err(StorageError::database)?;

        for entry in range {
            let (key, _) = entry.map_err(StorageError::database)?;
            let key_bytes = key.value();
            if !key_bytes.starts_with(prefix) {
                break;
            }
            keys.push(key_bytes.to_vec());
        }

        Ok(keys)
    }

    /// Count entries with a prefix
    pub fn count_prefix(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        prefix: &[u8],
    ) -> Result<usize, StorageError> {
        self.scan_keys(table, prefix).map(|v| v.len())
    }
}
