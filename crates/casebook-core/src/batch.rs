//! Batch-scoped state: manifest, resolved targets, transfer outcomes, and the
//! aggregate per-file state map.
//!
//! A `BatchState` is owned exclusively by the batch that created it; no two
//! batches share mutable state. Its lifetime is one user-initiated upload
//! action; dropping it drops local observation only, never server-side work.

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{TransferOutcome, UploadManifestEntry, UploadTarget};
use crate::state::FileUploadState;

/// A file that passed confirmation, carrying both sides of the join key.
#[derive(Debug, Clone)]
pub struct ConfirmedFile {
    pub local_id: Uuid,
    pub file_id: Uuid,
    pub name: String,
}

/// Derived batch-level summary ("7 of 10 uploaded"). Computed from the state
/// map on demand, never separately tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub transferred: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct BatchState {
    entries: Vec<UploadManifestEntry>,
    targets: HashMap<Uuid, UploadTarget>,
    outcomes: HashMap<Uuid, TransferOutcome>,
    states: HashMap<Uuid, FileUploadState>,
}

impl BatchState {
    pub fn new(entries: Vec<UploadManifestEntry>) -> Self {
        let states = entries
            .iter()
            .map(|e| (e.local_id, FileUploadState::Pending))
            .collect();
        Self {
            entries,
            targets: HashMap::new(),
            outcomes: HashMap::new(),
            states,
        }
    }

    pub fn entries(&self) -> &[UploadManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record (or replace, after a single-file re-resolution) the target for
    /// one entry.
    pub fn set_target(&mut self, local_id: Uuid, target: UploadTarget) {
        self.targets.insert(local_id, target);
    }

    pub fn target(&self, local_id: &Uuid) -> Option<&UploadTarget> {
        self.targets.get(local_id)
    }

    /// Record the immutable transfer outcome for one entry.
    pub fn record_outcome(&mut self, local_id: Uuid, outcome: TransferOutcome) {
        self.outcomes.insert(local_id, outcome);
    }

    pub fn outcome(&self, local_id: &Uuid) -> Option<&TransferOutcome> {
        self.outcomes.get(local_id)
    }

    pub fn state(&self, local_id: &Uuid) -> Option<&FileUploadState> {
        self.states.get(local_id)
    }

    pub fn states(&self) -> &HashMap<Uuid, FileUploadState> {
        &self.states
    }

    /// Reverse lookup from the origin's file id to the local id.
    pub fn local_for_file(&self, file_id: &Uuid) -> Option<Uuid> {
        self.targets
            .iter()
            .find(|(_, t)| &t.file_id == file_id)
            .map(|(local_id, _)| *local_id)
    }

    /// Advance one file to `next`, honoring the state machine.
    ///
    /// Happy-path jumps observed across a poll gap (e.g. `queued` seen as
    /// `completed` on the next tick) are walked stage by stage so no
    /// transition skips a stage. Returns false and leaves the state untouched
    /// if the transition is illegal.
    pub fn advance(&mut self, local_id: Uuid, next: FileUploadState) -> bool {
        let Some(current) = self.states.get(&local_id) else {
            tracing::warn!(local_id = %local_id, "State update for unknown manifest entry");
            return false;
        };
        if *current == next {
            return false;
        }
        let mut cursor = current.clone();
        while !cursor.can_transition_to(&next) {
            // Step through the next happy-path stage.
            cursor = match cursor {
                FileUploadState::Confirmed => FileUploadState::Queued,
                FileUploadState::Queued => FileUploadState::Processing,
                _ => {
                    tracing::warn!(
                        local_id = %local_id,
                        from = %cursor,
                        to = %next,
                        "Illegal state transition ignored"
                    );
                    return false;
                }
            };
        }
        self.states.insert(local_id, next);
        true
    }

    /// File ids whose transfer outcome succeeded, in manifest order.
    pub fn transferred_file_ids(&self) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter_map(|e| self.outcomes.get(&e.local_id))
            .filter(|o| o.succeeded)
            .map(|o| o.file_id)
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.entries.len(),
            transferred: 0,
            confirmed: 0,
            completed: 0,
            failed: 0,
        };
        for state in self.states.values() {
            match state {
                FileUploadState::Transferred
                | FileUploadState::Confirmed
                | FileUploadState::Queued
                | FileUploadState::Processing
                | FileUploadState::ProcessingTimeout
                | FileUploadState::Completed => summary.transferred += 1,
                FileUploadState::TransferFailed { .. }
                | FileUploadState::ProcessingFailed { .. } => summary.failed += 1,
                _ => {}
            }
            match state {
                FileUploadState::Confirmed
                | FileUploadState::Queued
                | FileUploadState::Processing
                | FileUploadState::ProcessingTimeout
                | FileUploadState::Completed => summary.confirmed += 1,
                _ => {}
            }
            if matches!(state, FileUploadState::Completed) {
                summary.completed += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransferErrorKind;

    fn entry(name: &str) -> UploadManifestEntry {
        UploadManifestEntry::new(name, 100, "application/pdf")
    }

    fn target() -> UploadTarget {
        UploadTarget {
            file_id: Uuid::new_v4(),
            storage_path: "user/abc.pdf".to_string(),
            token: "tok".to_string(),
        }
    }

    #[test]
    fn new_batch_starts_all_pending() {
        let batch = BatchState::new(vec![entry("a.pdf"), entry("b.pdf")]);
        assert_eq!(batch.len(), 2);
        assert!(batch
            .states()
            .values()
            .all(|s| *s == FileUploadState::Pending));
    }

    #[test]
    fn advance_walks_through_skipped_stages() {
        let e = entry("a.pdf");
        let local_id = e.local_id;
        let mut batch = BatchState::new(vec![e]);
        for state in [
            FileUploadState::Transferring,
            FileUploadState::Transferred,
            FileUploadState::Confirmed,
        ] {
            assert!(batch.advance(local_id, state));
        }
        // Poll gap: confirmed file observed straight at completed.
        assert!(batch.advance(local_id, FileUploadState::Completed));
        assert_eq!(batch.state(&local_id), Some(&FileUploadState::Completed));
    }

    #[test]
    fn advance_rejects_illegal_transitions() {
        let e = entry("a.pdf");
        let local_id = e.local_id;
        let mut batch = BatchState::new(vec![e]);
        assert!(!batch.advance(local_id, FileUploadState::Completed));
        assert_eq!(batch.state(&local_id), Some(&FileUploadState::Pending));
        assert!(!batch.advance(
            local_id,
            FileUploadState::TransferFailed {
                error: TransferErrorKind::Rejected
            }
        ));
    }

    #[test]
    fn confirmation_revert_only_applies_to_confirmed_files() {
        let e = entry("a.pdf");
        let local_id = e.local_id;
        let mut batch = BatchState::new(vec![e]);
        assert!(!batch.advance(local_id, FileUploadState::Transferred));

        batch.advance(local_id, FileUploadState::Transferring);
        batch.advance(local_id, FileUploadState::Transferred);
        batch.advance(local_id, FileUploadState::Confirmed);
        assert!(batch.advance(local_id, FileUploadState::Transferred));
        assert_eq!(batch.state(&local_id), Some(&FileUploadState::Transferred));
    }

    #[test]
    fn transferred_file_ids_preserve_manifest_order_and_skip_failures() {
        let entries = vec![entry("a.pdf"), entry("b.pdf"), entry("c.pdf")];
        let ids: Vec<Uuid> = entries.iter().map(|e| e.local_id).collect();
        let mut batch = BatchState::new(entries);

        let (t0, t1, t2) = (target(), target(), target());
        batch.set_target(ids[0], t0.clone());
        batch.set_target(ids[1], t1.clone());
        batch.set_target(ids[2], t2.clone());
        batch.record_outcome(ids[0], TransferOutcome::success(t0.file_id));
        batch.record_outcome(
            ids[1],
            TransferOutcome::failure(t1.file_id, TransferErrorKind::Rejected),
        );
        batch.record_outcome(ids[2], TransferOutcome::success(t2.file_id));

        assert_eq!(batch.transferred_file_ids(), vec![t0.file_id, t2.file_id]);
    }

    #[test]
    fn summary_is_derived_from_the_state_map() {
        let entries = vec![entry("a.pdf"), entry("b.pdf"), entry("c.pdf")];
        let ids: Vec<Uuid> = entries.iter().map(|e| e.local_id).collect();
        let mut batch = BatchState::new(entries);

        for id in &ids {
            batch.advance(*id, FileUploadState::Transferring);
        }
        batch.advance(
            ids[0],
            FileUploadState::TransferFailed {
                error: TransferErrorKind::Network,
            },
        );
        batch.advance(ids[1], FileUploadState::Transferred);
        batch.advance(ids[2], FileUploadState::Transferred);
        batch.advance(ids[2], FileUploadState::Confirmed);
        batch.advance(ids[2], FileUploadState::Completed);

        let summary = batch.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.transferred, 2);
        assert_eq!(summary.confirmed, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
    }
}
