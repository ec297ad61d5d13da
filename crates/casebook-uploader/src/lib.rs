//! Upload orchestration: batch coordination, confirmation, and processing
//! status tracking.
//!
//! The flow, end to end: a manifest goes to the resolver for signed upload
//! targets, the coordinator fans the transfers out over a bounded worker
//! pool, successful transfers are confirmed in one batched call, and the
//! tracker polls the origin's processing pipeline until every confirmed file
//! is terminal (or the caller's horizon elapses). State transitions are
//! emitted as events throughout so a UI can render per-file progress live.

pub mod coordinator;
pub mod events;
pub mod tracker;

pub use coordinator::{BatchCoordinator, BatchReport};
pub use events::{StatusBoard, UploadEvent};
pub use tracker::{DismissHandle, ProcessingTracker};
