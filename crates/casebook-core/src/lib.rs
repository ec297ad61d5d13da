//! Casebook Core Library
//!
//! This crate provides the domain models, per-file state machine, error types,
//! and configuration shared by the upload orchestrator components.

pub mod batch;
pub mod config;
pub mod error;
pub mod models;
pub mod state;

// Re-export commonly used types
pub use batch::{BatchState, BatchSummary, ConfirmedFile};
pub use config::UploaderConfig;
pub use error::UploadError;
pub use state::{project_state, FileUploadState};
