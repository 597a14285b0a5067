//! HTTP attachment fetcher

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::Client;
use tracing::{trace, warn};

use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult, SkipReason};
use crate::{AttachmentSource, FetchOutcome};

/// Pause between retry attempts, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Fetches attachment payloads over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Build a fetcher with its own connection pool
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("modlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// The fetch configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &str, max_size: u64) -> FetchOutcome {
        let mut response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Skipped(classify(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::Skipped(SkipReason::Status(status.as_u16()));
        }

        let declared = response.content_length().unwrap_or(0);
        if declared > max_size {
            return FetchOutcome::Skipped(SkipReason::ContentLengthTooLarge {
                length: declared,
                limit: max_size,
            });
        }

        let mut body = BytesMut::with_capacity(declared as usize);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if (body.len() + chunk.len()) as u64 > max_size {
                        return FetchOutcome::Skipped(SkipReason::BodyTooLarge { limit: max_size });
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => return FetchOutcome::Skipped(classify(&e)),
            }
        }

        trace!(url, bytes = body.len(), "Fetched attachment");
        FetchOutcome::Fetched(body.freeze())
    }
}

fn classify(err: &reqwest::Error) -> SkipReason {
    if err.is_timeout() {
        SkipReason::Timeout
    } else if let Some(status) = err.status() {
        SkipReason::Status(status.as_u16())
    } else {
        SkipReason::Network(err.to_string())
    }
}

#[async_trait]
impl AttachmentSource for HttpFetcher {
    async fn fetch(&self, url: &str, max_size: u64) -> FetchOutcome {
        let mut attempt = 0;
        loop {
            let outcome = self.fetch_once(url, max_size).await;

            let reason = match &outcome {
                FetchOutcome::Skipped(reason) if reason.is_transient() => reason,
                _ => return outcome,
            };

            if attempt >= self.config.retries {
                return outcome;
            }
            attempt += 1;

            warn!(url, %reason, attempt, "Retrying attachment fetch");
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }
    }
}
