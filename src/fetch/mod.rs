//! External fetch and transform collaborators.
//!
//! The pipeline talks to download and decompression tooling through the
//! narrow [`Fetcher`] and [`Transformer`] seams, so tests can substitute
//! scripted implementations and no command line is ever assembled from
//! shell strings.

mod command;
mod http;
mod retry;

pub use command::{CommandDecompressor, CommandFetcher};
pub use http::HttpFetcher;
pub use retry::RetryPolicy;

use crate::models::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Retrieves bytes from a remote source to a local path.
///
/// Implementations write to exactly the path they are given (the processor
/// passes a temporary name and publishes it only after verification) and
/// report failure with enough context to classify the error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()>;
}

/// Produces a derived artifact from a fetched one.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Path the transform will produce for `input`.
    fn output_path(&self, input: &Path) -> PathBuf;

    /// Run the transform, returning the produced path.
    async fn transform(&self, input: &Path) -> Result<PathBuf>;
}
