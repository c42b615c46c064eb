// src/trackers/fetcher.rs

//! Retrieval of raw tracker-list text with a hard per-request ceiling.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::FetchError;

/// Something that can turn a list URL into its text body.
#[async_trait]
pub trait TrackerFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

// Helper to create a client (called once per fetcher)
pub fn create_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("swarmsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// `reqwest`-backed fetcher. No retries: the cache decides when to try again.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let network = |reason: String| FetchError::Network {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network(format!("HTTP {}", response.status())));
        }

        response.text().await.map_err(|e| network(e.to_string()))
    }
}

#[async_trait]
impl TrackerFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        // Dropping the request future on expiry abandons it
        match tokio::time::timeout(timeout, self.get_text(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::TimedOut {
                url: url.to_string(),
                timeout,
            }),
        }
    }
}
