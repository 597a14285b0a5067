//! # Modlog Audit
//!
//! Moderation audit-log coordinator for a chat-platform integration.
//!
//! This crate provides [`AuditLog`], which ties together:
//! - Storage layer (message and member records in redb)
//! - Attachment capture (size-capped HTTP fetches)
//! - The ban-context query (a user's recent history across a guild)
//!
//! and [`EventDispatcher`], which routes typed gateway events to it and emits
//! [`ModerationRecord`]s for the presentation layer.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use modlog_audit::{AuditConfig, AuditLog, CollectingSink, EventDispatcher, HistoryWindow};
//! use modlog_core::StaticChannelDirectory;
//!
//! let channels = Arc::new(StaticChannelDirectory::new());
//! let config = AuditConfig::new("./modlog-data", HistoryWindow::trailing_hours(24));
//! let audit = Arc::new(AuditLog::open(config, channels.clone()).await?);
//!
//! let sink = Arc::new(CollectingSink::new());
//! let dispatcher = EventDispatcher::new(Arc::clone(&audit), sink.clone())
//!     .with_channel_cache(channels);
//! dispatcher.dispatch(event).await?;
//! ```

pub mod ban_context;
mod config;
pub mod dispatch;
mod error;
mod ingest;
mod membership;
pub mod transcript;
pub mod view;

pub use ban_context::{BanContext, HistoryWindow};
pub use config::{AuditConfig, DEFAULT_SCAN_CONCURRENCY};
pub use dispatch::{CollectingSink, EventDispatcher, ModerationRecord, RecordSink};
pub use error::{AuditError, AuditResult};
pub use ingest::{BulkDeletion, EditOutcome};
pub use transcript::{Transcript, TranscriptLine};

use std::sync::Arc;

use tracing::{info, instrument};

use modlog_core::{ChannelDirectory, Clock, GuildId, SystemClock, UserId};
use modlog_fetch::{AttachmentSource, HttpFetcher};
use modlog_storage::{AuditStorage, StorageError};

use ban_context::BanContextQuery;

/// The moderation audit log
///
/// Constructed once and shared through an `Arc`. Every operation takes
/// `&self`; database work runs on the blocking pool.
pub struct AuditLog {
    config: AuditConfig,
    storage: AuditStorage,
    source: Arc<dyn AttachmentSource>,
    channels: Arc<dyn ChannelDirectory>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    /// Open the store under `config.data_dir` with an HTTP attachment fetcher
    #[instrument(skip_all, fields(data_dir = %config.data_dir.display()))]
    pub async fn open(
        config: AuditConfig,
        channels: Arc<dyn ChannelDirectory>,
    ) -> AuditResult<Self> {
        let storage_config = config.storage.clone();
        let storage =
            tokio::task::spawn_blocking(move || AuditStorage::open(storage_config)).await??;
        let fetcher = HttpFetcher::new(config.fetch.clone())?;

        info!(window = %config.history_window, "Audit log opened");
        Ok(Self::with_parts(
            config,
            storage,
            Arc::new(fetcher),
            channels,
            Arc::new(SystemClock),
        ))
    }

    /// Assemble an audit log from explicit collaborators
    pub fn with_parts(
        config: AuditConfig,
        storage: AuditStorage,
        source: Arc<dyn AttachmentSource>,
        channels: Arc<dyn ChannelDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            storage,
            source,
            channels,
            clock,
        }
    }

    /// Release the database
    pub fn close(self) {
        info!(data_dir = %self.config.data_dir.display(), "Closing audit log");
        self.storage.close();
    }

    /// The configuration
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Direct access to the record stores
    pub fn storage(&self) -> &AuditStorage {
        &self.storage
    }

    /// The channel directory queries fan out over
    pub fn channels(&self) -> &Arc<dyn ChannelDirectory> {
        &self.channels
    }

    /// Collect a user's message history across the guild
    ///
    /// Never fails: channels whose scan fails are listed in
    /// [`BanContext::skipped_channels`].
    #[instrument(skip(self))]
    pub async fn ban_context(&self, guild: GuildId, user: UserId) -> BanContext {
        BanContextQuery {
            messages: self.storage.messages(),
            directory: self.channels.as_ref(),
            window: self.config.history_window,
            now: self.clock.now_utc(),
            concurrency: self.config.scan_concurrency,
        }
        .run(guild, user)
        .await
    }

    /// Run a store operation on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> AuditResult<T>
    where
        F: FnOnce(AuditStorage) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.storage.clone();
        Ok(tokio::task::spawn_blocking(move || f(storage)).await??)
    }
}
