//! # Modlog Storage
//!
//! Durable record stores for the moderation audit log, backed by a single
//! redb database.
//!
//! ## Features
//!
//! - **MessageStore**: messages keyed by (guild, channel, message), channel
//!   scans in creation order, atomic content edits
//! - **MemberStore**: wholesale membership snapshots keyed by (guild, user)
//! - **AuditStorage**: both stores over one `modlog.redb` file
//!
//! All operations are synchronous and take `&self`; stores are cheap `Clone`
//! handles. Async callers run them through `tokio::task::spawn_blocking`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use modlog_core::{Snowflake, StoredMessage};
//! use modlog_storage::{AuditStorage, StorageConfig};
//!
//! let storage = AuditStorage::open(StorageConfig::in_dir("./data"))?;
//! let message = StoredMessage::new(
//!     Snowflake(1), Snowflake(1), Snowflake(100), Snowflake(42), "hi",
//! );
//! storage.messages().put(&message)?;
//!
//! let history = storage.messages().scan_by_channel(Snowflake(1), Snowflake(1))?;
//! assert_eq!(history.len(), 1);
//! ```

pub mod composite;
pub mod error;
pub mod keys;
pub mod members;
pub mod messages;
pub mod tables;

// Re-exports
pub use composite::AuditStorage;
pub use error::StorageError;
pub use members::MemberStore;
pub use messages::{EditResult, MessageStore};
pub use tables::{RedbStorage, StorageConfig};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
