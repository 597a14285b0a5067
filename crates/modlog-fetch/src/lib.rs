//! # Modlog Fetch
//!
//! Best-effort attachment capture for the moderation audit log.
//!
//! Attachment bytes are fetched at ingestion time because the platform's
//! copies disappear once a message is deleted. Every attachment is either
//! captured whole or skipped; a skip is never an error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use modlog_fetch::{fetch_attachments, FetchConfig, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new(FetchConfig::default())?;
//! let stored = fetch_attachments(&fetcher, &message.attachments, 10 << 20, 4).await;
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use config::{DEFAULT_MAX_ATTACHMENT_SIZE, FetchConfig};
pub use error::{FetchError, FetchResult, SkipReason};
pub use http::HttpFetcher;
pub use mock::StaticSource;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use modlog_core::{AttachmentInfo, StoredAttachment};

/// Result of a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The complete payload
    Fetched(Bytes),
    /// Nothing was captured
    Skipped(SkipReason),
}

impl FetchOutcome {
    /// The payload, if fetched
    pub fn bytes(self) -> Option<Bytes> {
        match self {
            Self::Fetched(bytes) => Some(bytes),
            Self::Skipped(_) => None,
        }
    }
}

/// Where attachment bytes come from
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Fetch the payload at `url`, giving up once it exceeds `max_size` bytes
    async fn fetch(&self, url: &str, max_size: u64) -> FetchOutcome;
}

/// Capture the attachments of one message
///
/// Attachments declared over `max_size` are skipped without a request. The
/// rest are fetched with at most `concurrency` in flight. The result keeps the
/// declared order with skipped attachments omitted.
pub async fn fetch_attachments<S>(
    source: &S,
    attachments: &[AttachmentInfo],
    max_size: u64,
    concurrency: usize,
) -> Vec<StoredAttachment>
where
    S: AttachmentSource + ?Sized,
{
    // Owned, boxed futures keep the caller's future Send for any lifetime
    let fetches: Vec<BoxFuture<'_, Option<StoredAttachment>>> = attachments
        .iter()
        .cloned()
        .map(|info| fetch_one(source, info, max_size).boxed())
        .collect();

    stream::iter(fetches)
        .buffered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect()
}

async fn fetch_one<S>(source: &S, info: AttachmentInfo, max_size: u64) -> Option<StoredAttachment>
where
    S: AttachmentSource + ?Sized,
{
    if info.size > max_size {
        let reason = SkipReason::DeclaredTooLarge {
            size: info.size,
            limit: max_size,
        };
        debug!(filename = %info.filename, %reason, "Skipping attachment");
        return None;
    }

    match source.fetch(&info.url, max_size).await {
        FetchOutcome::Fetched(data) => Some(StoredAttachment::new(info.filename, data, info.size)),
        FetchOutcome::Skipped(reason) if reason.is_size_limit() => {
            debug!(filename = %info.filename, %reason, "Skipping attachment");
            None
        }
        FetchOutcome::Skipped(reason) => {
            warn!(filename = %info.filename, url = %info.url, %reason, "Attachment fetch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Test that AttachmentSource is object-safe
    fn _assert_object_safe(_: &dyn AttachmentSource) {}

    fn info(name: &str, size: u64) -> AttachmentInfo {
        AttachmentInfo::new(name, format!("mem://{name}"), size)
    }

    #[tokio::test]
    async fn test_declared_over_cap_is_not_requested() {
        let source = StaticSource::new();
        source.insert("mem://big.bin", vec![0u8; 32]);

        let stored = fetch_attachments(&source, &[info("big.bin", 32)], 16, 4).await;
        assert!(stored.is_empty());
        assert_eq!(source.requests(), 0);
    }

    #[tokio::test]
    async fn test_keeps_declared_order_and_drops_failures() {
        let source = StaticSource::new();
        source.insert("mem://a", b"aaa".to_vec());
        source.insert("mem://c", b"c".to_vec());
        source.insert("mem://d", b"dd".to_vec());

        let attachments = vec![
            info("a", 3),
            info("b", 1), // not in source
            info("c", 1),
            info("huge", 1_000),
            info("d", 2),
        ];

        let stored = fetch_attachments(&source, &attachments, 100, 2).await;
        let names: Vec<_> = stored.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "d"]);
        assert_eq!(stored[0].data.as_ref(), b"aaa");
        assert_eq!(source.requests(), 4);
    }

    #[tokio::test]
    async fn test_actual_size_over_cap_is_skipped() {
        // Declared size lies; the payload itself is too big
        let source = StaticSource::new();
        source.insert("mem://liar", vec![1u8; 64]);

        let stored = fetch_attachments(&source, &[info("liar", 1)], 16, 1).await;
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let source: Arc<dyn AttachmentSource> = Arc::new({
            let s = StaticSource::new();
            s.insert("mem://x", b"x".to_vec());
            s
        });

        let stored = fetch_attachments(source.as_ref(), &[info("x", 1)], 16, 0).await;
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_can_run_on_spawned_task() {
        let source: Arc<dyn AttachmentSource> = Arc::new({
            let s = StaticSource::new();
            s.insert("mem://y", b"yy".to_vec());
            s
        });
        let attachments = vec![info("y", 2), info("z", 1)];

        let stored = tokio::spawn(async move {
            fetch_attachments(source.as_ref(), &attachments, 16, 2).await
        })
        .await
        .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].filename, "y");
    }
}
