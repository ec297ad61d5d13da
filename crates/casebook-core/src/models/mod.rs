//! Data models for the upload orchestrator
//!
//! Manifest entries describe what the client intends to upload; upload targets
//! are the origin service's answer; transfer outcomes are what the executors
//! report back.

mod manifest;
mod upload;

pub use manifest::*;
pub use upload::*;
