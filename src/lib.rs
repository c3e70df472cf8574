//! genofetch - checkpointed parallel fetching of genomic sequence data.
//!
//! ## Architecture
//!
//! genofetch runs a fetch-and-transform pipeline over a list of remote
//! work items (assembly FTP paths or nucleotide accessions):
//!
//! - **CheckpointStore**: durable per-item progress, atomic write-then-rename
//! - **RetryPolicy**: bounded retries with exponential backoff for
//!   transient failures
//! - **FetchProcessor**: fetch → verify → optional decompress per item
//! - **WorkerPool**: bounded concurrent execution, outcomes recorded in the
//!   checkpoint before an item is reported complete
//! - **PipelineRunner**: checkpoint filtering, scheduling, run summary
//!
//! A crashed or interrupted run resumes from the checkpoint, reprocessing
//! only items without a recorded terminal success.

pub mod checkpoint;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod pool;

// Re-exports for convenience
pub use checkpoint::{CheckpointRecord, CheckpointStore};
pub use fetch::{
    CommandDecompressor, CommandFetcher, Fetcher, HttpFetcher, RetryPolicy, Transformer,
};
pub use models::{Config, ErrorKind, GenofetchError, Outcome, Result, RunSummary, WorkItem};
pub use pipeline::PipelineRunner;
pub use pool::{FetchProcessor, ItemProcessor, WorkerPool};
