//! HTTP client for the Casebook origin API and the direct-to-storage
//! transfer endpoint.
//!
//! Provides a minimal bearer-authenticated client with a generic POST helper,
//! the wire types for the upload endpoints, and the two seams the orchestrator
//! is written against: [`OriginApi`] and [`StorageTransfer`].

pub mod api;
pub mod storage;

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

pub use api::{FileStatusEntry, OriginApi};
pub use storage::{SignedUrlStorage, StorageTransfer};

/// HTTP client for the origin API with bearer-token auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Create client from environment: CASEBOOK_API_URL, CASEBOOK_API_TOKEN.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let base_url = std::env::var("CASEBOOK_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let token = std::env::var("CASEBOOK_API_TOKEN")
            .context("Missing API token. Set CASEBOOK_API_TOKEN")?;

        Self::new(base_url, token, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: serde::de::DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }
}
