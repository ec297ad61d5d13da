//! Error types for the upload orchestrator.
//!
//! `UploadError` covers batch-wide failures: manifest rejection before any
//! network call, resolver contract violations, and transport failures on the
//! batched origin calls. Per-file transfer failures are not errors at this
//! level; they live in [`TransferOutcome`](crate::models::TransferOutcome)
//! and never propagate to sibling files.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Batch is empty")]
    EmptyBatch,

    #[error("Batch too large: {size} files (max: {max})")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Invalid manifest entry: {0}")]
    InvalidManifest(String),

    #[error("Missing payload for manifest entry {0}")]
    MissingPayload(Uuid),

    #[error("Upload target count mismatch: requested {requested}, returned {returned}")]
    CorrelationMismatch { requested: usize, returned: usize },

    #[error("Origin API error: {0}")]
    Api(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for UploadError {
    fn from(err: validator::ValidationErrors) -> Self {
        UploadError::InvalidManifest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_too_large_names_the_limit() {
        let err = UploadError::BatchTooLarge { size: 51, max: 50 };
        assert_eq!(err.to_string(), "Batch too large: 51 files (max: 50)");
    }

    #[test]
    fn correlation_mismatch_names_both_counts() {
        let err = UploadError::CorrelationMismatch {
            requested: 3,
            returned: 2,
        };
        assert!(err.to_string().contains("requested 3"));
        assert!(err.to_string().contains("returned 2"));
    }
}
