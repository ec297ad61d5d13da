//! State-transition events and the live status view.
//!
//! The coordinator and tracker emit one event per transition on an unbounded
//! channel; consumers that only want the current picture read the shared
//! [`StatusBoard`] instead. Both carry the same `FileUploadState` values, so
//! UI code has exactly one field to render.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use casebook_core::state::FileUploadState;

/// One per-file state transition, emitted as it occurs.
#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub local_id: Uuid,
    /// Set once the file has a resolved upload target.
    pub file_id: Option<Uuid>,
    pub name: String,
    pub state: FileUploadState,
}

pub type EventSender = mpsc::UnboundedSender<UploadEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<UploadEvent>;

/// Live, continuously updated map of `local_id → FileUploadState`.
///
/// Cheap to clone; the coordinator and tracker write through it as
/// transitions happen, so a consumer can snapshot at any point.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    states: Arc<RwLock<HashMap<Uuid, FileUploadState>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, local_id: Uuid, state: FileUploadState) {
        if let Ok(mut states) = self.states.write() {
            states.insert(local_id, state);
        }
    }

    pub fn get(&self, local_id: &Uuid) -> Option<FileUploadState> {
        self.states.read().ok().and_then(|s| s.get(local_id).cloned())
    }

    pub fn snapshot(&self) -> HashMap<Uuid, FileUploadState> {
        self.states.read().map(|s| s.clone()).unwrap_or_default()
    }
}
