//! HTTP fetcher implementation
//!
//! This module handles all outbound requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests for page markup
//! - Streaming downloads of data files to disk
//! - Retry logic for transient failures
//! - The shared minimum interval between requests

use crate::config::NetworkConfig;
use crate::crawler::Throttle;
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Errors from fetching a page or downloading a file
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl FetchError {
    /// Returns true for failures worth another attempt (timeouts, transport
    /// errors, 5xx). Client errors and local I/O errors are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Io { .. } => false,
        }
    }

    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Collaborator that performs the crawl's network I/O
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches page markup
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Downloads `url` into `dest`, returning the size of the file on disk
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The network configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &NetworkConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher with retries and request throttling
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 4xx | Immediate failure |
/// | HTTP 5xx | Retry, exponential backoff |
/// | Timeout | Retry, exponential backoff |
/// | Connection error | Retry, exponential backoff |
/// | Local write error | Immediate failure |
///
/// Every attempt, retries included, waits on the shared throttle first.
pub struct HttpFetcher {
    client: Client,
    throttle: Arc<Throttle>,
    fetch_timeout: Duration,
    download_timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the `[network]` configuration section
    pub fn new(config: &NetworkConfig) -> Result<Self, FetchError> {
        let client = build_http_client(config).map_err(|e| FetchError::Transport {
            url: String::new(),
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            throttle: Arc::new(Throttle::new(Duration::from_millis(
                config.request_interval_ms,
            ))),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            max_attempts: config.max_retries.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out
    async fn with_retry<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            self.throttle.wait().await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    warn!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.get(url, self.download_timeout).await?;

        let io_err = |source: std::io::Error| FetchError::Io {
            path: dest.display().to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;

        let streamed: Result<(), FetchError> = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))?
            {
                file.write_all(&chunk).await.map_err(io_err)?;
            }
            file.flush().await.map_err(io_err)?;
            Ok(())
        }
        .await;

        drop(file);

        if let Err(e) = streamed {
            // a partial file must not be mistaken for a finished download
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e);
        }

        let size = tokio::fs::metadata(dest).await.map_err(io_err)?.len();
        Ok(size)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching {}", url);
        self.with_retry(url, || async move {
            let response = self.get(url, self.fetch_timeout).await?;
            response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))
        })
        .await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        debug!("Downloading {} to {}", url, dest.display());
        self.with_retry(url, || self.download_once(url, dest)).await
    }
}
