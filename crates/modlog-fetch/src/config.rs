//! Configuration for attachment fetching

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest attachment the platform lets a regular account upload
pub const DEFAULT_MAX_ATTACHMENT_SIZE: u64 = 10 * 1024 * 1024;

/// Attachment fetch limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attachments larger than this are never stored
    pub max_size: u64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Fetches in flight per message
    pub max_concurrent: usize,
    /// Extra attempts after a network, timeout or 5xx failure
    pub retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_ATTACHMENT_SIZE,
            timeout_secs: 30,
            max_concurrent: 4,
            retries: 0,
        }
    }
}

impl FetchConfig {
    /// Set the size cap
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the number of concurrent fetches per message
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the number of retries for transient failures
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Concurrency limit, never zero
    pub fn concurrency(&self) -> usize {
        self.max_concurrent.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.max_size, 10 * 1024 * 1024);
        assert_eq!(config.retries, 0);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_builders() {
        let config = FetchConfig::default()
            .with_max_size(5)
            .with_timeout(Duration::from_millis(10))
            .with_max_concurrent(0)
            .with_retries(2);
        assert_eq!(config.max_size, 5);
        assert_eq!(config.timeout_secs, 1);
        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.retries, 2);
    }
}
