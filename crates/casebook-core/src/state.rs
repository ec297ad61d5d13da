//! Per-file upload state machine and status projection.
//!
//! `FileUploadState` is the single externally visible value consumers render.
//! It combines the local transfer lifecycle with the remote processing
//! pipeline into one enum:
//!
//! ```text
//! pending → transferring → transferred → confirmed → queued → processing → completed
//! ```
//!
//! Failure exits: `transferring → transfer_failed`,
//! `confirmed|queued|processing → processing_failed`. Both failure states and
//! `completed` are terminal. `processing_timeout` is a UI-visible variant of
//! `processing` reported when the local observation horizon elapses; the
//! document may still complete server-side.
//!
//! Transitions are strictly monotonic within one file; no stage is skipped or
//! revisited. The single sanctioned exception is `confirmed → transferred`
//! when a confirmation call fails after the fact; [`can_transition_to`]
//! admits that edge.
//!
//! [`can_transition_to`]: FileUploadState::can_transition_to

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::models::{ProcessingStatus, TransferErrorKind};

/// Externally visible per-file state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum FileUploadState {
    Pending,
    Transferring,
    Transferred,
    Confirmed,
    Queued,
    Processing,
    Completed,
    TransferFailed { error: TransferErrorKind },
    ProcessingFailed { message: Option<String> },
    ProcessingTimeout,
}

impl FileUploadState {
    /// Terminal states have no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileUploadState::Completed
                | FileUploadState::TransferFailed { .. }
                | FileUploadState::ProcessingFailed { .. }
        )
    }

    /// Position in the happy path, if this state is on it.
    fn stage(&self) -> Option<u8> {
        match self {
            FileUploadState::Pending => Some(0),
            FileUploadState::Transferring => Some(1),
            FileUploadState::Transferred => Some(2),
            FileUploadState::Confirmed => Some(3),
            FileUploadState::Queued => Some(4),
            FileUploadState::Processing => Some(5),
            FileUploadState::Completed => Some(6),
            _ => None,
        }
    }

    /// Whether `next` is a legal transition from this state.
    ///
    /// Happy-path stages advance one at a time. Failure exits are allowed only
    /// from the stages named in the state machine. `confirmed → transferred`
    /// is the defined confirmation-revert exception, not a race.
    pub fn can_transition_to(&self, next: &FileUploadState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            FileUploadState::TransferFailed { .. } => {
                matches!(self, FileUploadState::Transferring)
            }
            FileUploadState::ProcessingFailed { .. } | FileUploadState::ProcessingTimeout => {
                matches!(
                    self,
                    FileUploadState::Confirmed
                        | FileUploadState::Queued
                        | FileUploadState::Processing
                )
            }
            FileUploadState::Transferred if matches!(self, FileUploadState::Confirmed) => true,
            _ => match (self.stage(), next.stage()) {
                (Some(from), Some(to)) => to == from + 1,
                // A timed-out file may still be observed finishing later.
                (None, Some(to)) if matches!(self, FileUploadState::ProcessingTimeout) => to >= 5,
                _ => false,
            },
        }
    }
}

impl Display for FileUploadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileUploadState::Pending => write!(f, "pending"),
            FileUploadState::Transferring => write!(f, "transferring"),
            FileUploadState::Transferred => write!(f, "transferred"),
            FileUploadState::Confirmed => write!(f, "confirmed"),
            FileUploadState::Queued => write!(f, "queued"),
            FileUploadState::Processing => write!(f, "processing"),
            FileUploadState::Completed => write!(f, "completed"),
            FileUploadState::TransferFailed { .. } => write!(f, "transfer_failed"),
            FileUploadState::ProcessingFailed { .. } => write!(f, "processing_failed"),
            FileUploadState::ProcessingTimeout => write!(f, "processing_timeout"),
        }
    }
}

/// Combine the local transfer state with the remote processing state into the
/// single value consumers render. Pure; no I/O.
///
/// The remote state only matters once the file is past confirmation — a file
/// that never reached `confirmed` keeps its local state regardless of what the
/// server might report for a stale id.
pub fn project_state(
    local: &FileUploadState,
    remote: Option<(ProcessingStatus, Option<&str>)>,
) -> FileUploadState {
    let past_confirmation = matches!(
        local,
        FileUploadState::Confirmed
            | FileUploadState::Queued
            | FileUploadState::Processing
            | FileUploadState::ProcessingTimeout
    );
    if !past_confirmation {
        return local.clone();
    }
    match remote {
        None => local.clone(),
        Some((ProcessingStatus::Queued, _)) => FileUploadState::Queued,
        Some((ProcessingStatus::Processing, _)) => FileUploadState::Processing,
        Some((ProcessingStatus::Completed, _)) => FileUploadState::Completed,
        Some((ProcessingStatus::Failed, message)) => FileUploadState::ProcessingFailed {
            message: message.map(str::to_string),
        },
    }
}
