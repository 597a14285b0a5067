//! Configuration for the audit log

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use modlog_fetch::FetchConfig;
use modlog_logging::LogConfig;
use modlog_storage::StorageConfig;

use crate::ban_context::HistoryWindow;
use crate::error::{AuditError, AuditResult};

/// Default number of channel scans a ban-context query runs at once
pub const DEFAULT_SCAN_CONCURRENCY: usize = 8;

/// Configuration for an [`AuditLog`](crate::AuditLog)
///
/// There is no `Default`: the ban history window must always be chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditConfig {
    /// Base directory for all audit data
    pub data_dir: PathBuf,
    /// Database configuration
    pub storage: StorageConfig,
    /// Attachment fetch limits
    pub fetch: FetchConfig,
    /// Which messages a ban-context query reports
    pub history_window: HistoryWindow,
    /// Channel scans in flight per ban-context query
    pub scan_concurrency: usize,
    /// Remove message records once their deletion has been reported
    pub prune_deleted_messages: bool,
    /// Logging configuration, used by the binary
    pub logging: LogConfig,
}

impl AuditConfig {
    /// Create a configuration rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>, history_window: HistoryWindow) -> Self {
        let data_dir = data_dir.into();
        Self {
            storage: StorageConfig::in_dir(&data_dir),
            data_dir,
            fetch: FetchConfig::default(),
            history_window,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
            prune_deleted_messages: false,
            logging: LogConfig::default(),
        }
    }

    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuditError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> AuditResult<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        file.into_config()
    }

    /// Move all data to another directory
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self.storage.db_path = StorageConfig::in_dir(&self.data_dir).db_path;
        self
    }

    /// Set the storage configuration
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Set the fetch configuration
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Set the ban history window
    pub fn with_history_window(mut self, window: HistoryWindow) -> Self {
        self.history_window = window;
        self
    }

    /// Set the ban-context scan concurrency
    pub fn with_scan_concurrency(mut self, concurrency: usize) -> Self {
        self.scan_concurrency = concurrency;
        self
    }

    /// Remove message records after reporting their deletion
    pub fn with_prune_deleted_messages(mut self, prune: bool) -> Self {
        self.prune_deleted_messages = prune;
        self
    }

    /// Set the logging configuration
    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }
}

/// On-disk shape of the configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    history_window: HistoryWindow,
    #[serde(default)]
    storage: StorageSection,
    #[serde(default)]
    fetch: FetchConfig,
    #[serde(default = "default_scan_concurrency")]
    scan_concurrency: usize,
    #[serde(default)]
    prune_deleted_messages: bool,
    #[serde(default)]
    logging: LogConfig,
}

/// Storage settings; the database path defaults to a file in `data_dir`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageSection {
    db_path: Option<PathBuf>,
    cache_size: Option<usize>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./modlog-data")
}

fn default_scan_concurrency() -> usize {
    DEFAULT_SCAN_CONCURRENCY
}

impl ConfigFile {
    fn into_config(self) -> AuditResult<AuditConfig> {
        if self.scan_concurrency == 0 {
            return Err(AuditError::Config("scan_concurrency must be at least 1".into()));
        }
        if let HistoryWindow::Trailing { hours: 0 } = self.history_window {
            return Err(AuditError::Config(
                "history_window.trailing.hours must be at least 1".into(),
            ));
        }

        let mut storage = StorageConfig::in_dir(&self.data_dir);
        if let Some(db_path) = self.storage.db_path {
            storage.db_path = db_path;
        }
        if let Some(cache_size) = self.storage.cache_size {
            storage.cache_size = cache_size;
        }

        Ok(AuditConfig {
            data_dir: self.data_dir,
            storage,
            fetch: self.fetch,
            history_window: self.history_window,
            scan_concurrency: self.scan_concurrency,
            prune_deleted_messages: self.prune_deleted_messages,
            logging: self.logging,
        })
    }
}
