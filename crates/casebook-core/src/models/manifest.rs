use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Content type assumed when the client does not report one.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// One file the client intends to upload.
///
/// `local_id` is assigned by the client when the user selects the file and is
/// stable for the lifetime of one batch submission; it is never reused across
/// batches.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadManifestEntry {
    pub local_id: Uuid,
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub name: String,
    /// File size in bytes
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub size_bytes: u64,
    /// Content type (MIME type); empty means unknown
    pub mime_type: String,
}

impl UploadManifestEntry {
    pub fn new(name: impl Into<String>, size_bytes: u64, mime_type: impl Into<String>) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            name: name.into(),
            size_bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Content type to report to the origin service.
    pub fn effective_mime_type(&self) -> &str {
        if self.mime_type.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            &self.mime_type
        }
    }
}

/// In-memory payload for one manifest entry.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub local_id: Uuid,
    pub data: Bytes,
}

impl FilePayload {
    pub fn new(local_id: Uuid, data: impl Into<Bytes>) -> Self {
        Self {
            local_id,
            data: data.into(),
        }
    }
}
