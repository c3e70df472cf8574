//! Pipeline orchestration: source lists, checkpoint filtering, scheduling.

mod runner;
mod source;

pub use runner::PipelineRunner;
pub use source::{accession_items, assembly_items, read_source_list};
