//! Test doubles for the two orchestrator seams: a scripted origin service
//! and a scripted storage endpoint.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use casebook_client::{FileStatusEntry, OriginApi, StorageTransfer};
use casebook_core::models::{
    ProcessingStatus, TransferErrorKind, UploadManifestEntry, UploadTarget,
};

/// Opt-in log output for debugging test runs: RUST_LOG=debug cargo test.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// How the mock origin answers confirmation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmBehavior {
    /// Echo every requested id back (idempotent, like the real origin).
    AcceptAll,
    /// Return an empty confirmed list.
    AcceptNone,
    /// Fail the call outright.
    Fail,
}

/// Scripted origin service.
///
/// Targets are generated with `storage_path = "batch/{name}"` so storage
/// scripts can key off the filename even across re-resolutions.
pub struct MockOrigin {
    /// Entry names of each initiate call, in call order.
    pub initiate_calls: Mutex<Vec<Vec<String>>>,
    /// Targets returned by each initiate call, in call order.
    pub issued_targets: Mutex<Vec<Vec<UploadTarget>>>,
    /// Ids of each confirm call, in call order.
    pub confirm_calls: Mutex<Vec<Vec<Uuid>>>,
    pub confirm_behavior: Mutex<ConfirmBehavior>,
    /// When set, initiate returns this many fewer targets than requested.
    pub short_by: usize,
    /// Per-file scripted status sequence; the last element repeats.
    statuses: Mutex<HashMap<Uuid, VecDeque<(ProcessingStatus, Option<String>)>>>,
}

impl MockOrigin {
    pub fn new() -> Self {
        Self {
            initiate_calls: Mutex::new(Vec::new()),
            issued_targets: Mutex::new(Vec::new()),
            confirm_calls: Mutex::new(Vec::new()),
            confirm_behavior: Mutex::new(ConfirmBehavior::AcceptAll),
            short_by: 0,
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn short_by(n: usize) -> Self {
        Self {
            short_by: n,
            ..Self::new()
        }
    }

    pub fn set_confirm_behavior(&self, behavior: ConfirmBehavior) {
        *self.confirm_behavior.lock().unwrap() = behavior;
    }

    pub fn script_statuses(&self, file_id: Uuid, seq: Vec<(ProcessingStatus, Option<String>)>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(file_id, seq.into_iter().collect());
    }

    pub fn initiate_call_count(&self) -> usize {
        self.initiate_calls.lock().unwrap().len()
    }
}

impl Default for MockOrigin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OriginApi for MockOrigin {
    async fn initiate_upload(&self, entries: &[UploadManifestEntry]) -> Result<Vec<UploadTarget>> {
        self.initiate_calls
            .lock()
            .unwrap()
            .push(entries.iter().map(|e| e.name.clone()).collect());

        let count = entries.len().saturating_sub(self.short_by);
        let targets: Vec<UploadTarget> = entries
            .iter()
            .take(count)
            .map(|e| UploadTarget {
                file_id: Uuid::new_v4(),
                storage_path: format!("batch/{}", e.name),
                token: format!("tok-{}", Uuid::new_v4()),
            })
            .collect();
        self.issued_targets.lock().unwrap().push(targets.clone());
        Ok(targets)
    }

    async fn confirm_upload(&self, file_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.confirm_calls.lock().unwrap().push(file_ids.to_vec());
        match *self.confirm_behavior.lock().unwrap() {
            ConfirmBehavior::AcceptAll => Ok(file_ids.to_vec()),
            ConfirmBehavior::AcceptNone => Ok(Vec::new()),
            ConfirmBehavior::Fail => Err(anyhow::anyhow!("confirm endpoint unavailable")),
        }
    }

    async fn file_statuses(&self, file_ids: &[Uuid]) -> Result<Vec<FileStatusEntry>> {
        let mut statuses = self.statuses.lock().unwrap();
        Ok(file_ids
            .iter()
            .map(|id| {
                let (status, error_message) = match statuses.get_mut(id) {
                    Some(seq) if seq.len() > 1 => seq.pop_front().unwrap(),
                    Some(seq) => seq.front().cloned().unwrap_or((ProcessingStatus::Queued, None)),
                    None => (ProcessingStatus::Queued, None),
                };
                FileStatusEntry {
                    file_id: *id,
                    status,
                    error_message,
                }
            })
            .collect())
    }
}

/// Scripted storage endpoint. Failure scripts are keyed by the filename
/// embedded in the storage path; each scripted failure is consumed once, then
/// transfers succeed.
pub struct MockStorage {
    scripts: Mutex<HashMap<String, VecDeque<TransferErrorKind>>>,
    pub calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new()
        }
    }

    /// Queue failures for the file with this name; attempts after the queue
    /// drains succeed.
    pub fn script_failures(&self, name: &str, failures: Vec<TransferErrorKind>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), failures.into_iter().collect());
    }

    pub fn call_count_for(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.ends_with(name))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageTransfer for MockStorage {
    async fn put_object(
        &self,
        storage_path: &str,
        _token: &str,
        _content_type: &str,
        _data: Bytes,
    ) -> Result<(), TransferErrorKind> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.calls.lock().unwrap().push(storage_path.to_string());
        let result = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .iter_mut()
                .find(|(name, _)| storage_path.ends_with(name.as_str()))
                .and_then(|(_, queue)| queue.pop_front())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match result {
            Some(kind) => Err(kind),
            None => Ok(()),
        }
    }
}
