use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::client::{Fetcher, TransportError};

/// `reqwest`-backed fetcher used for real runs.
///
/// Reading stops once `max_bytes` have arrived, so oversized bodies are
/// cut off rather than rejected. The snapshotter applies the same cap and
/// flags the document as truncated.
pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout_secs: u64, max_bytes: u64) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .user_agent(user_agent.to_string())
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .context("failed to build HTTP client")?,
            max_bytes,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        debug!("GET {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let cap = usize::try_from(self.max_bytes).unwrap_or(usize::MAX);
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })? {
            let room = cap.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!("{} exceeded {} bytes, truncating", url, self.max_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_fetcher_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/docs/intro.md")
            .with_status(200)
            .with_body("# Intro\n")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new("skillgen-test", 5, 1024).unwrap();
        let body = fetcher
            .fetch(&format!("{}/docs/intro.md", server.url()))
            .await
            .unwrap();

        assert_eq!(body, b"# Intro\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_fetcher_maps_status_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone")
            .with_status(410)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new("skillgen-test", 5, 1024).unwrap();
        let url = format!("{}/gone", server.url());
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err, TransportError::Status { url, status: 410 });
    }

    #[tokio::test]
    async fn test_http_fetcher_truncates_at_byte_cap() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big")
            .with_status(200)
            .with_body("x".repeat(100))
            .create_async()
            .await;

        let fetcher = HttpFetcher::new("skillgen-test", 5, 10).unwrap();
        let body = fetcher
            .fetch(&format!("{}/big", server.url()))
            .await
            .unwrap();
        assert_eq!(body.len(), 10);
    }

    #[tokio::test]
    async fn test_byte_capped_http_body_snapshots_as_truncated() {
        use crate::pipeline::parser::LinkEntry;
        use crate::pipeline::snapshot::{snapshot, SnapshotPolicy};

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big")
            .with_status(200)
            .with_body("x".repeat(100))
            .create_async()
            .await;

        let fetcher = HttpFetcher::new("skillgen-test", 5, 10).unwrap();
        let link = LinkEntry {
            url: format!("{}/big", server.url()),
            label: "Big".to_string(),
            description: String::new(),
            section: 0,
        };
        let policy = SnapshotPolicy {
            allow_external_domains: true,
            domain_allow_list: Vec::new(),
            max_page_chars: 0,
            max_bytes_per_doc: 10,
        };

        let doc = snapshot(&link, &fetcher, &policy).await;
        assert!(doc.is_ok());
        assert_eq!(doc.bytes, 10);
        assert!(doc.truncated);
    }

    #[tokio::test]
    async fn test_http_fetcher_sends_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ua")
            .match_header("user-agent", "skillgen/9.9")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new("skillgen/9.9", 5, 1024).unwrap();
        fetcher
            .fetch(&format!("{}/ua", server.url()))
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
