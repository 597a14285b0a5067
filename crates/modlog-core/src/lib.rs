//! # Modlog Core
//!
//! Core identifiers, records, events and seams for the modlog audit store.
//!
//! This crate holds everything the storage, fetch and audit crates share
//! without depending on each other.
//!
//! ## Key Types
//!
//! - [`Snowflake`]: Platform-issued identifier that embeds its creation time
//! - [`StoredMessage`] / [`StoredMember`]: The records the store persists
//! - [`GatewayEvent`]: Closed set of inbound chat-platform events
//!
//! ## Key Traits
//!
//! - [`ChannelDirectory`]: Cached channel enumeration owned by the gateway layer
//! - [`Clock`]: Time abstraction for testability

pub mod error;
pub mod event;
pub mod record;
pub mod snowflake;
pub mod traits;

// Re-export main types
pub use error::InvalidIdentifier;
pub use event::{AttachmentInfo, GatewayEvent, IncomingMessage, MemberSnapshot, UserInfo};
pub use record::{StoredAttachment, StoredMember, StoredMessage};
pub use snowflake::{
    ChannelId, GuildId, MessageId, PLATFORM_EPOCH_MILLIS, RoleId, Snowflake, UserId,
    account_age_days, created_at,
};
pub use traits::{
    ChannelDirectory, ChannelInfo, ChannelKind, Clock, FixedClock, StaticChannelDirectory,
    SystemClock,
};
