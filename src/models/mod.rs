//! Data models: configuration, errors, work items, and outcomes.

mod config;
mod error;
mod item;

pub use config::{CheckpointConfig, Config, ConfigError, FetchConfig, OutputConfig, WorkersConfig};
pub use error::{ErrorKind, GenofetchError, Result};
pub use item::{FailedItem, Outcome, RunSummary, SourceKind, Stage, WorkItem};
