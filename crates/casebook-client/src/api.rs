//! Origin API endpoints and wire types.
//!
//! Three calls: initiate (manifest → signed upload targets, order-correlated
//! with the request array), confirm (transferred ids → accepted subset), and
//! status (confirmed ids → per-file processing state).

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use casebook_core::models::{ProcessingStatus, UploadManifestEntry, UploadTarget};

use crate::ApiClient;

/// One file the client intends to upload.
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
struct InitiateUploadRequest {
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct InitiateUploadResponse {
    uploads: Vec<UploadTarget>,
}

#[derive(Debug, Serialize)]
struct ConfirmUploadRequest {
    file_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ConfirmUploadResponse {
    confirmed: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct FileStatusRequest {
    file_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct FileStatusResponse {
    files: Vec<FileStatusEntry>,
}

/// Per-file processing state as reported by the origin service.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStatusEntry {
    pub file_id: Uuid,
    pub status: ProcessingStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// The origin service's upload contract. Implemented by [`ApiClient`]; tests
/// substitute scripted fakes.
#[async_trait]
pub trait OriginApi: Send + Sync {
    /// Exchange a file manifest for one signed upload target per entry, in
    /// the same order as the request.
    async fn initiate_upload(
        &self,
        entries: &[UploadManifestEntry],
    ) -> Result<Vec<UploadTarget>>;

    /// Promote transferred objects into durable document records. The
    /// returned list is the subset the origin actually accepted.
    async fn confirm_upload(&self, file_ids: &[Uuid]) -> Result<Vec<Uuid>>;

    /// Processing pipeline state for the given file ids.
    async fn file_statuses(&self, file_ids: &[Uuid]) -> Result<Vec<FileStatusEntry>>;
}

#[async_trait]
impl OriginApi for ApiClient {
    async fn initiate_upload(
        &self,
        entries: &[UploadManifestEntry],
    ) -> Result<Vec<UploadTarget>> {
        let request = InitiateUploadRequest {
            files: entries
                .iter()
                .map(|e| FileEntry {
                    name: e.name.clone(),
                    size: e.size_bytes,
                    mime_type: e.effective_mime_type().to_string(),
                })
                .collect(),
        };
        tracing::debug!(files = entries.len(), "Initiating upload batch");
        let response: InitiateUploadResponse =
            self.post_json("/files/initiate-upload", &request).await?;
        Ok(response.uploads)
    }

    async fn confirm_upload(&self, file_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let request = ConfirmUploadRequest {
            file_ids: file_ids.to_vec(),
        };
        tracing::debug!(files = file_ids.len(), "Confirming uploaded files");
        let response: ConfirmUploadResponse =
            self.post_json("/files/confirm-upload", &request).await?;
        Ok(response.confirmed)
    }

    async fn file_statuses(&self, file_ids: &[Uuid]) -> Result<Vec<FileStatusEntry>> {
        let request = FileStatusRequest {
            file_ids: file_ids.to_vec(),
        };
        let response: FileStatusResponse = self.post_json("/files/status", &request).await?;
        Ok(response.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_entry_deserializes_without_error_message() {
        let entry: FileStatusEntry = serde_json::from_str(
            r#"{"file_id": "7f2f64bd-5c88-4b8a-9d2e-0f2f3f1a2b3c", "status": "processing"}"#,
        )
        .unwrap();
        assert_eq!(entry.status, ProcessingStatus::Processing);
        assert!(entry.error_message.is_none());
    }

    #[test]
    fn status_entry_carries_error_message_verbatim() {
        let entry: FileStatusEntry = serde_json::from_str(
            r#"{"file_id": "7f2f64bd-5c88-4b8a-9d2e-0f2f3f1a2b3c", "status": "failed", "error_message": "virus scan flagged file"}"#,
        )
        .unwrap();
        assert_eq!(entry.status, ProcessingStatus::Failed);
        assert_eq!(entry.error_message.as_deref(), Some("virus scan flagged file"));
    }

    #[test]
    fn initiate_request_serializes_snake_case_fields() {
        let request = InitiateUploadRequest {
            files: vec![FileEntry {
                name: "brief.pdf".to_string(),
                size: 1024,
                mime_type: "application/pdf".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["files"][0]["mime_type"], "application/pdf");
        assert_eq!(json["files"][0]["size"], 1024);
    }
}
