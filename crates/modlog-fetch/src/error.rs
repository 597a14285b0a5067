//! Fetch outcomes and errors

use thiserror::Error;

/// Why an attachment was not captured
///
/// Skips are expected outcomes. They are logged and never fail ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The platform declared a size over the cap; no request was made
    #[error("declared size {size} exceeds cap {limit}")]
    DeclaredTooLarge { size: u64, limit: u64 },

    /// The server reported a Content-Length over the cap
    #[error("content length {length} exceeds cap {limit}")]
    ContentLengthTooLarge { length: u64, limit: u64 },

    /// The body grew past the cap while streaming
    #[error("body exceeded cap {limit} while streaming")]
    BodyTooLarge { limit: u64 },

    /// The server answered with a non-success status
    #[error("server returned status {0}")]
    Status(u16),

    /// The request did not finish in time
    #[error("request timed out")]
    Timeout,

    /// Connection or body read failure
    #[error("network error: {0}")]
    Network(String),

    /// The source has nothing under this url
    #[error("no content for url")]
    Unavailable,
}

impl SkipReason {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status(code) => *code >= 500,
            _ => false,
        }
    }

    /// Whether the skip was caused by the size cap
    pub fn is_size_limit(&self) -> bool {
        matches!(
            self,
            Self::DeclaredTooLarge { .. } | Self::ContentLengthTooLarge { .. } | Self::BodyTooLarge { .. }
        )
    }
}

/// Errors building a fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Result type for fetcher construction
pub type FetchResult<T> = Result<T, FetchError>;
