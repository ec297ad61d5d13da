//! Batch coordinator: resolve targets, fan transfers out over a bounded
//! worker pool, collect outcomes, confirm.
//!
//! The batch as a whole never blocks on a single file — one file's permanent
//! failure does not halt or roll back the others. Retry policy per file:
//! network failures get a fixed small number of extra attempts with a short
//! backoff; an expired credential triggers exactly one single-file
//! re-resolution (a stale token cannot be refreshed in place); rejected and
//! unknown failures are permanent on the first attempt.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;
use validator::Validate;

use casebook_client::{OriginApi, StorageTransfer};
use casebook_core::batch::{BatchState, BatchSummary, ConfirmedFile};
use casebook_core::config::UploaderConfig;
use casebook_core::error::UploadError;
use casebook_core::models::{
    FilePayload, TransferErrorKind, TransferOutcome, UploadManifestEntry, UploadTarget,
};
use casebook_core::state::FileUploadState;

use crate::events::{EventReceiver, EventSender, StatusBoard, UploadEvent};

/// Settled snapshot of one batch run.
///
/// `needs_confirmation_retry` holds file ids that transferred but were not
/// accepted by the confirmation call; their bytes are in storage and only the
/// database linkage is missing. They are surfaced for an explicit retry via
/// [`BatchCoordinator::retry_confirmation`], never auto-retried indefinitely.
#[derive(Debug)]
pub struct BatchReport {
    pub batch: BatchState,
    pub confirmed: Vec<ConfirmedFile>,
    pub needs_confirmation_retry: Vec<Uuid>,
}

impl BatchReport {
    pub fn states(&self) -> &HashMap<Uuid, FileUploadState> {
        self.batch.states()
    }

    pub fn summary(&self) -> BatchSummary {
        self.batch.summary()
    }

    /// Confirmed file ids in manifest order, for optimistic merging into the
    /// document table pending the next full reload.
    pub fn confirmed_file_ids(&self) -> Vec<Uuid> {
        self.confirmed.iter().map(|f| f.file_id).collect()
    }
}

enum JobMsg {
    Transition {
        local_id: Uuid,
        state: FileUploadState,
    },
    Done {
        local_id: Uuid,
        target: UploadTarget,
        outcome: TransferOutcome,
    },
}

pub struct BatchCoordinator {
    origin: Arc<dyn OriginApi>,
    storage: Arc<dyn StorageTransfer>,
    config: UploaderConfig,
    events: EventSender,
    board: StatusBoard,
}

impl BatchCoordinator {
    /// Create a coordinator and the receiving end of its event stream.
    pub fn new(
        origin: Arc<dyn OriginApi>,
        storage: Arc<dyn StorageTransfer>,
        config: UploaderConfig,
    ) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                origin,
                storage,
                config,
                events,
                board: StatusBoard::new(),
            },
            rx,
        )
    }

    /// Live per-file status view, updated as transitions happen.
    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    /// Sender for the event stream, for handing to the processing tracker.
    pub fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    /// Run one batch: resolve, transfer concurrently, confirm.
    ///
    /// Fatal errors (`EmptyBatch`, `BatchTooLarge`, `CorrelationMismatch`,
    /// resolver transport failure) abort before any transfer starts. After
    /// that point, per-file failures stay per-file and the call settles with
    /// a report covering every manifest entry.
    #[tracing::instrument(skip(self, entries, payloads), fields(files = entries.len()))]
    pub async fn run(
        &self,
        entries: Vec<UploadManifestEntry>,
        payloads: Vec<FilePayload>,
    ) -> Result<BatchReport, UploadError> {
        if entries.is_empty() {
            return Err(UploadError::EmptyBatch);
        }
        if entries.len() > self.config.max_batch_size {
            return Err(UploadError::BatchTooLarge {
                size: entries.len(),
                max: self.config.max_batch_size,
            });
        }
        for entry in &entries {
            entry.validate()?;
        }
        let mut data: HashMap<Uuid, Bytes> = payloads
            .into_iter()
            .map(|p| (p.local_id, p.data))
            .collect();
        if let Some(entry) = entries.iter().find(|e| !data.contains_key(&e.local_id)) {
            return Err(UploadError::MissingPayload(entry.local_id));
        }

        let mut batch = BatchState::new(entries);
        self.resolve_targets(&mut batch).await?;
        self.run_transfers(&mut batch, &mut data).await;
        let (confirmed, needs_retry) = self.confirm(&mut batch).await;

        let report = BatchReport {
            batch,
            confirmed,
            needs_confirmation_retry: needs_retry,
        };
        let summary = report.summary();
        tracing::info!(
            total = summary.total,
            transferred = summary.transferred,
            confirmed = summary.confirmed,
            failed = summary.failed,
            "Batch settled"
        );
        Ok(report)
    }

    /// Exchange the manifest for one upload target per entry. Correlation is
    /// positional: the response is zipped by index, never matched by key, and
    /// a count mismatch fails the whole batch rather than silently dropping
    /// files.
    async fn resolve_targets(&self, batch: &mut BatchState) -> Result<(), UploadError> {
        let targets = self
            .origin
            .initiate_upload(batch.entries())
            .await
            .map_err(UploadError::Api)?;

        if targets.len() != batch.len() {
            return Err(UploadError::CorrelationMismatch {
                requested: batch.len(),
                returned: targets.len(),
            });
        }

        let local_ids: Vec<Uuid> = batch.entries().iter().map(|e| e.local_id).collect();
        for (local_id, target) in local_ids.into_iter().zip(targets) {
            batch.set_target(local_id, target);
        }
        tracing::debug!(files = batch.len(), "Upload targets resolved");
        Ok(())
    }

    /// Fan transfers out over the worker pool and fold outcomes back into the
    /// batch as they arrive.
    async fn run_transfers(&self, batch: &mut BatchState, data: &mut HashMap<Uuid, Bytes>) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers));
        let (msg_tx, mut msg_rx) = mpsc::channel::<JobMsg>(batch.len().max(1) * 4);

        for entry in batch.entries().to_vec() {
            // Targets and payloads were validated to exist for every entry.
            let Some(target) = batch.target(&entry.local_id).cloned() else {
                continue;
            };
            let Some(payload) = data.remove(&entry.local_id) else {
                continue;
            };
            let origin = self.origin.clone();
            let storage = self.storage.clone();
            let config = self.config.clone();
            let semaphore = semaphore.clone();
            let msg_tx = msg_tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                transfer_with_retry(origin, storage, config, entry, target, payload, msg_tx).await;
            });
        }
        drop(msg_tx);

        while let Some(msg) = msg_rx.recv().await {
            match msg {
                JobMsg::Transition { local_id, state } => {
                    self.apply(batch, local_id, state);
                }
                JobMsg::Done {
                    local_id,
                    target,
                    outcome,
                } => {
                    // A re-resolved file carries a fresh target (and file id);
                    // keep the join key current before recording the outcome.
                    batch.set_target(local_id, target);
                    let next = if outcome.succeeded {
                        FileUploadState::Transferred
                    } else {
                        FileUploadState::TransferFailed {
                            error: outcome.error.unwrap_or(TransferErrorKind::Unknown),
                        }
                    };
                    batch.record_outcome(local_id, outcome);
                    self.apply(batch, local_id, next);
                }
            }
        }
    }

    /// One batched confirmation call with exactly the successfully
    /// transferred ids. Returns the confirmed files (manifest order) and the
    /// ids left needing manual retry.
    async fn confirm(&self, batch: &mut BatchState) -> (Vec<ConfirmedFile>, Vec<Uuid>) {
        let transferred = batch.transferred_file_ids();
        if transferred.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let accepted: HashSet<Uuid> = match self.origin.confirm_upload(&transferred).await {
            Ok(confirmed) => confirmed.into_iter().collect(),
            Err(e) => {
                tracing::warn!(
                    files = transferred.len(),
                    error = %e,
                    "Confirmation call failed; transferred files await manual retry"
                );
                return (Vec::new(), transferred);
            }
        };

        let mut confirmed = Vec::new();
        let mut needs_retry = Vec::new();
        for entry in batch.entries().to_vec() {
            let Some(outcome) = batch.outcome(&entry.local_id) else {
                continue;
            };
            if !outcome.succeeded {
                continue;
            }
            let file_id = outcome.file_id;
            if accepted.contains(&file_id) {
                self.apply(batch, entry.local_id, FileUploadState::Confirmed);
                confirmed.push(ConfirmedFile {
                    local_id: entry.local_id,
                    file_id,
                    name: entry.name.clone(),
                });
            } else {
                // Not accepted: the file stays `transferred` and is surfaced
                // as needing manual retry.
                needs_retry.push(file_id);
            }
        }
        if !needs_retry.is_empty() {
            tracing::warn!(
                unconfirmed = needs_retry.len(),
                "Origin accepted fewer files than requested"
            );
        }
        (confirmed, needs_retry)
    }

    /// Re-submit exactly the transferred-but-unconfirmed set. Safe to call
    /// with ids the origin already confirmed; confirmation is idempotent on
    /// the origin side.
    #[tracing::instrument(skip(self, report), fields(files = report.needs_confirmation_retry.len()))]
    pub async fn retry_confirmation(
        &self,
        report: &mut BatchReport,
    ) -> Result<Vec<Uuid>, UploadError> {
        if report.needs_confirmation_retry.is_empty() {
            return Ok(Vec::new());
        }
        let accepted: HashSet<Uuid> = self
            .origin
            .confirm_upload(&report.needs_confirmation_retry)
            .await
            .map_err(UploadError::Api)?
            .into_iter()
            .collect();

        let mut newly_confirmed = Vec::new();
        let mut still_unconfirmed = Vec::new();
        for file_id in std::mem::take(&mut report.needs_confirmation_retry) {
            if !accepted.contains(&file_id) {
                still_unconfirmed.push(file_id);
                continue;
            }
            if let Some(local_id) = report.batch.local_for_file(&file_id) {
                let name = report
                    .batch
                    .entries()
                    .iter()
                    .find(|e| e.local_id == local_id)
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                self.apply(&mut report.batch, local_id, FileUploadState::Confirmed);
                report.confirmed.push(ConfirmedFile {
                    local_id,
                    file_id,
                    name,
                });
            }
            newly_confirmed.push(file_id);
        }
        report.needs_confirmation_retry = still_unconfirmed;
        Ok(newly_confirmed)
    }

    /// Advance one file and publish the transition on the board and the event
    /// stream.
    fn apply(&self, batch: &mut BatchState, local_id: Uuid, state: FileUploadState) {
        if !batch.advance(local_id, state.clone()) {
            return;
        }
        self.board.set(local_id, state.clone());
        let file_id = batch.target(&local_id).map(|t| t.file_id);
        let name = batch
            .entries()
            .iter()
            .find(|e| e.local_id == local_id)
            .map(|e| e.name.clone())
            .unwrap_or_default();
        tracing::debug!(local_id = %local_id, file_id = ?file_id, state = %state, "File state transition");
        let _ = self.events.send(UploadEvent {
            local_id,
            file_id,
            name,
            state,
        });
    }
}

/// One file's transfer, retried per the coordinator's policy. Reports
/// transitions and the terminal outcome through `msg_tx`; the final target is
/// sent back because a re-resolution replaces the file id.
async fn transfer_with_retry(
    origin: Arc<dyn OriginApi>,
    storage: Arc<dyn StorageTransfer>,
    config: UploaderConfig,
    entry: UploadManifestEntry,
    mut target: UploadTarget,
    data: Bytes,
    msg_tx: mpsc::Sender<JobMsg>,
) {
    let _ = msg_tx
        .send(JobMsg::Transition {
            local_id: entry.local_id,
            state: FileUploadState::Transferring,
        })
        .await;

    let mut network_retries_left = config.transfer_retries;
    let mut reresolved = false;

    let outcome = loop {
        let attempt = storage
            .put_object(
                &target.storage_path,
                &target.token,
                entry.effective_mime_type(),
                data.clone(),
            )
            .await;

        match attempt {
            Ok(()) => break TransferOutcome::success(target.file_id),
            Err(TransferErrorKind::Network) if network_retries_left > 0 => {
                network_retries_left -= 1;
                tracing::debug!(
                    local_id = %entry.local_id,
                    retries_left = network_retries_left,
                    "Transfer hit network failure, retrying"
                );
                sleep(config.retry_backoff()).await;
            }
            Err(TransferErrorKind::ExpiredCredential) if !reresolved => {
                reresolved = true;
                tracing::info!(
                    local_id = %entry.local_id,
                    "Upload token expired, re-resolving single file"
                );
                match origin.initiate_upload(std::slice::from_ref(&entry)).await {
                    Ok(mut targets) if targets.len() == 1 => {
                        target = targets.remove(0);
                    }
                    Ok(targets) => {
                        tracing::warn!(
                            local_id = %entry.local_id,
                            returned = targets.len(),
                            "Single-file re-resolution returned wrong count"
                        );
                        break TransferOutcome::failure(
                            target.file_id,
                            TransferErrorKind::ExpiredCredential,
                        );
                    }
                    Err(e) => {
                        tracing::warn!(local_id = %entry.local_id, error = %e, "Re-resolution failed");
                        break TransferOutcome::failure(
                            target.file_id,
                            TransferErrorKind::ExpiredCredential,
                        );
                    }
                }
            }
            Err(kind) => break TransferOutcome::failure(target.file_id, kind),
        }
    };

    let _ = msg_tx
        .send(JobMsg::Done {
            local_id: entry.local_id,
            target,
            outcome,
        })
        .await;
}
