//! Direct-to-storage transfer.
//!
//! The storage endpoint is separate from the origin service: the client PUTs
//! raw bytes to the object path named by the signed upload target, authorized
//! by its single-use token. One invocation performs exactly one attempt; the
//! batch coordinator owns retry policy.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::time::Duration;

use casebook_core::models::TransferErrorKind;

/// Storage transfer seam. Implementations must be side-effect-free with
/// respect to shared memory so many transfers can run in parallel.
#[async_trait]
pub trait StorageTransfer: Send + Sync {
    /// Upload one object. Exactly one attempt; a failure is categorized so
    /// the caller can decide whether to retry.
    async fn put_object(
        &self,
        storage_path: &str,
        token: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), TransferErrorKind>;
}

/// Categorize a non-2xx storage response.
///
/// 401/403 mean the signed token is no longer honored (expired or consumed);
/// other 4xx are the provider rejecting the object itself; 5xx are transient
/// server faults and retried like transport failures.
pub fn categorize_status(status: StatusCode) -> TransferErrorKind {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        TransferErrorKind::ExpiredCredential
    } else if status.is_client_error() {
        TransferErrorKind::Rejected
    } else if status.is_server_error() {
        TransferErrorKind::Network
    } else {
        TransferErrorKind::Unknown
    }
}

/// Transfers via signed-URL PUT against an object storage endpoint.
#[derive(Clone, Debug)]
pub struct SignedUrlStorage {
    client: reqwest::Client,
    base_url: String,
}

impl SignedUrlStorage {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create storage client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment: CASEBOOK_STORAGE_URL.
    pub fn from_env(timeout: Duration) -> anyhow::Result<Self> {
        let base_url = std::env::var("CASEBOOK_STORAGE_URL")
            .map_err(|_| anyhow::anyhow!("Missing storage URL. Set CASEBOOK_STORAGE_URL"))?;
        Self::new(base_url, timeout)
    }
}

#[async_trait]
impl StorageTransfer for SignedUrlStorage {
    async fn put_object(
        &self,
        storage_path: &str,
        token: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), TransferErrorKind> {
        let url = format!("{}/{}", self.base_url, storage_path.trim_start_matches('/'));
        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(storage_path = %storage_path, error = %e, "Storage transfer transport error");
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    TransferErrorKind::Network
                } else {
                    TransferErrorKind::Unknown
                }
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(storage_path = %storage_path, "Object stored");
            return Ok(());
        }

        let kind = categorize_status(status);
        tracing::warn!(
            storage_path = %storage_path,
            status = %status,
            category = %kind,
            "Storage transfer rejected"
        );
        Err(kind)
    }
}
