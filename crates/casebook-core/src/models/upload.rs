use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// A signed upload target returned by the origin service for one manifest entry.
///
/// `file_id` is the origin's durable identifier for the eventual document row
/// and the join key between local and server state for the rest of the batch.
/// `token` is single-use and time-boxed; it must never be persisted beyond the
/// batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTarget {
    pub file_id: Uuid,
    pub storage_path: String,
    pub token: String,
}

/// Failure category for one transfer attempt. Drives the coordinator's retry
/// policy: network failures retry, expired credentials re-resolve, everything
/// else fails immediately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferErrorKind {
    Network,
    ExpiredCredential,
    Rejected,
    Unknown,
}

impl TransferErrorKind {
    /// Whether the coordinator may retry the same target after this failure.
    pub fn is_retriable(&self) -> bool {
        matches!(self, TransferErrorKind::Network)
    }
}

impl Display for TransferErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TransferErrorKind::Network => write!(f, "network"),
            TransferErrorKind::ExpiredCredential => write!(f, "expired_credential"),
            TransferErrorKind::Rejected => write!(f, "rejected"),
            TransferErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for TransferErrorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network" => Ok(TransferErrorKind::Network),
            "expired_credential" => Ok(TransferErrorKind::ExpiredCredential),
            "rejected" => Ok(TransferErrorKind::Rejected),
            "unknown" => Ok(TransferErrorKind::Unknown),
            _ => Err(anyhow::anyhow!("Invalid transfer error kind: {}", s)),
        }
    }
}

/// Terminal result of one file's transfer. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub file_id: Uuid,
    pub succeeded: bool,
    pub error: Option<TransferErrorKind>,
}

impl TransferOutcome {
    pub fn success(file_id: Uuid) -> Self {
        Self {
            file_id,
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(file_id: Uuid, kind: TransferErrorKind) -> Self {
        Self {
            file_id,
            succeeded: false,
            error: Some(kind),
        }
    }
}

/// Server-side processing pipeline state, as reported by the origin service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStatus::Queued => write!(f, "queued"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ProcessingStatus::Queued),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}
