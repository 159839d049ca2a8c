use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Why a single fetch produced no bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

/// The only network capability the pipeline depends on.
///
/// Implementations resolve redirects and caching however they like; callers
/// only see the final body or a typed failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// In-memory fetcher for tests and `--dry-run` style runs.
///
/// Unknown URLs answer with a 404. Every call is counted and recorded so
/// tests can assert that policy-skipped links never reach the network.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, Result<Vec<u8>, TransportError>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_error(mut self, url: &str, error: TransportError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    /// Hold the response for `url` back by `delay` before answering.
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.requested.lock() {
            urls.push(url.to_string());
        }

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        match self.responses.get(url) {
            Some(response) => response.clone(),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
