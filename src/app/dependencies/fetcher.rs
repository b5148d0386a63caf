//! Module source fetching
//!
//! [`ModuleFetcher`] is the network seam of the resolver. The HTTP
//! implementation bounds every fetch with a timeout and caches sources by URL
//! across artifacts.

#![warn(clippy::all, rust_2018_idioms)]

use async_trait::async_trait;
use moka::sync::Cache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default per-module fetch budget
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Timeout { url: String, after: Duration },
    Status { url: String, status: u16 },
    Network { url: String, message: String },
    InvalidUrl { url: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout { url, after } => {
                write!(f, "Fetching {} timed out after {}ms", url, after.as_millis())
            }
            FetchError::Status { url, status } => write!(f, "Fetching {} returned HTTP {}", url, status),
            FetchError::Network { url, message } => write!(f, "Fetching {} failed: {}", url, message),
            FetchError::InvalidUrl { url } => write!(f, "Invalid module URL: {}", url),
        }
    }
}

impl std::error::Error for FetchError {}

#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Arc<String>, FetchError>;
}

pub struct HttpModuleFetcher {
    client: reqwest::Client,
    cache: Cache<String, Arc<String>>,
    timeout: Duration,
}

impl HttpModuleFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(64 * 1024 * 1024)
            .weigher(|_url: &String, source: &Arc<String>| -> u32 {
                source.len().try_into().unwrap_or(u32::MAX)
            })
            .time_to_idle(Duration::from_secs(60 * 60))
            .build();

        Ok(Self {
            client,
            cache,
            timeout,
        })
    }

    pub fn cached(&self, url: &str) -> Option<Arc<String>> {
        self.cache.get(url)
    }
}

#[async_trait]
impl ModuleFetcher for HttpModuleFetcher {
    async fn fetch(&self, url: &str) -> Result<Arc<String>, FetchError> {
        if let Some(source) = self.cache.get(url) {
            trace_debug!("Module cache hit: {}", url);
            return Ok(source);
        }

        if url::Url::parse(url).is_err() {
            return Err(FetchError::InvalidUrl { url: url.to_string() });
        }

        let request = async {
            let response = self.client.get(url).send().await.map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response.text().await.map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })
        };

        let body = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            })??;

        let source = Arc::new(body);
        self.cache.insert(url.to_string(), source.clone());
        Ok(source)
    }
}
