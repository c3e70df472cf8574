//! Checkpoint persistence for resumable pipeline runs.
//!
//! - Outcomes are recorded per work-item key, one write per completion
//! - State is persisted to disk atomically (write-then-rename)
//! - A missing or corrupt checkpoint forfeits prior progress, never the run

mod store;

pub use store::{CheckpointRecord, CheckpointStore};
