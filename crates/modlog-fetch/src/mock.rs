//! In-memory attachment source

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::SkipReason;
use crate::{AttachmentSource, FetchOutcome};

/// Url → bytes map implementing [`AttachmentSource`]
///
/// Used by tests and by offline replay, where no network is available.
#[derive(Debug, Default)]
pub struct StaticSource {
    entries: DashMap<String, Bytes>,
    failures: DashMap<String, SkipReason>,
    requests: AtomicUsize,
}

impl StaticSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` under `url`
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.entries.insert(url.into(), data.into());
    }

    /// Fail every request for `url` with `reason`
    pub fn fail(&self, url: impl Into<String>, reason: SkipReason) {
        self.failures.insert(url.into(), reason);
    }

    /// Number of fetches served so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AttachmentSource for StaticSource {
    async fn fetch(&self, url: &str, max_size: u64) -> FetchOutcome {
        self.requests.fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = self.failures.get(url) {
            return FetchOutcome::Skipped(reason.value().clone());
        }

        match self.entries.get(url) {
            Some(data) if data.len() as u64 > max_size => {
                FetchOutcome::Skipped(SkipReason::BodyTooLarge { limit: max_size })
            }
            Some(data) => FetchOutcome::Fetched(data.value().clone()),
            None => FetchOutcome::Skipped(SkipReason::Unavailable),
        }
    }
}
