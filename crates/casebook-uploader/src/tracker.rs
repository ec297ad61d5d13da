//! Processing status tracker.
//!
//! Polls the origin service for the pipeline state of confirmed files,
//! scoped to the ids still in a non-terminal state. Polling for an id stops
//! the moment it reports `completed` or `failed`; the tracker stops once all
//! ids are terminal, the caller's horizon elapses, or the batch is dismissed.
//! Dismissal drops local observation only — the server-side job is never
//! cancelled and will be reflected the next time the document list loads.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use casebook_client::OriginApi;
use casebook_core::batch::ConfirmedFile;
use casebook_core::config::UploaderConfig;
use casebook_core::state::{project_state, FileUploadState};

use crate::coordinator::BatchReport;
use crate::events::{EventSender, StatusBoard, UploadEvent};

/// Stops a tracker's observation without touching server-side work.
#[derive(Clone)]
pub struct DismissHandle {
    tx: mpsc::Sender<()>,
}

impl DismissHandle {
    pub async fn dismiss(&self) {
        let _ = self.tx.send(()).await;
    }
}

pub struct ProcessingTracker {
    origin: Arc<dyn OriginApi>,
    config: UploaderConfig,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ProcessingTracker {
    pub fn new(origin: Arc<dyn OriginApi>, config: UploaderConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            origin,
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn dismiss_handle(&self) -> DismissHandle {
        DismissHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Observe the batch's confirmed files until each reaches a terminal
    /// state, the horizon elapses (remaining files report
    /// `processing_timeout`, a non-terminal state), or the batch is
    /// dismissed. Poll failures are treated as transient; the next tick
    /// retries.
    #[tracing::instrument(skip_all, fields(files = report.confirmed.len()))]
    pub async fn track(mut self, report: &mut BatchReport, board: &StatusBoard, events: &EventSender) {
        let mut pending: HashMap<Uuid, ConfirmedFile> = report
            .confirmed
            .iter()
            .filter(|f| {
                report
                    .batch
                    .state(&f.local_id)
                    .is_some_and(|s| !s.is_terminal())
            })
            .map(|f| (f.file_id, f.clone()))
            .collect();

        if pending.is_empty() {
            return;
        }

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick fires immediately; skip it so the origin has a poll
        // interval's worth of time before the first status query.
        interval.tick().await;

        let horizon = self.config.processing_horizon();
        let horizon_sleep = tokio::time::sleep(horizon.unwrap_or_default());
        tokio::pin!(horizon_sleep);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    tracing::info!(
                        remaining = pending.len(),
                        "Batch dismissed; dropping observation, server-side processing continues"
                    );
                    return;
                }
                _ = &mut horizon_sleep, if horizon.is_some() => {
                    for file in pending.values() {
                        apply(report, board, events, file, FileUploadState::ProcessingTimeout);
                    }
                    tracing::info!(
                        remaining = pending.len(),
                        "Processing horizon elapsed; remaining files reported as processing_timeout"
                    );
                    return;
                }
                _ = interval.tick() => {
                    let ids: Vec<Uuid> = pending.keys().copied().collect();
                    let statuses = match self.origin.file_statuses(&ids).await {
                        Ok(statuses) => statuses,
                        Err(e) => {
                            tracing::warn!(error = %e, "Status poll failed, will retry next tick");
                            continue;
                        }
                    };
                    for status in statuses {
                        let Some(file) = pending.get(&status.file_id).cloned() else {
                            continue;
                        };
                        let Some(local) = report.batch.state(&file.local_id).cloned() else {
                            continue;
                        };
                        let next = project_state(
                            &local,
                            Some((status.status, status.error_message.as_deref())),
                        );
                        if next != local {
                            apply(report, board, events, &file, next.clone());
                        }
                        if next.is_terminal() {
                            pending.remove(&status.file_id);
                        }
                    }
                    if pending.is_empty() {
                        tracing::info!("All confirmed files reached a terminal state");
                        return;
                    }
                }
            }
        }
    }
}

fn apply(
    report: &mut BatchReport,
    board: &StatusBoard,
    events: &EventSender,
    file: &ConfirmedFile,
    state: FileUploadState,
) {
    if !report.batch.advance(file.local_id, state.clone()) {
        return;
    }
    board.set(file.local_id, state.clone());
    tracing::debug!(
        local_id = %file.local_id,
        file_id = %file.file_id,
        state = %state,
        "Processing state transition"
    );
    let _ = events.send(UploadEvent {
        local_id: file.local_id,
        file_id: Some(file.file_id),
        name: file.name.clone(),
        state,
    });
}
