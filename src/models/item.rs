//! Work items, processing outcomes, and run summaries.

use crate::models::{ErrorKind, GenofetchError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// NCBI nucleotide accession grammar (e.g. NC_012345.1, NZ_ABCD01000001.1).
static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}_?[A-Z0-9]+\.\d{1,2}$").expect("valid pattern"));

/// Kind of remote source a work item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Full URL to a genomic assembly archive (ftp/http/https).
    Assembly,
    /// NCBI nucleotide accession, fetched via E-utils.
    Accession,
}

/// One unit of fetch/transform work.
///
/// The key is derived deterministically from the source reference, so a
/// rerun over the same input list produces the same keys and the checkpoint
/// can match records across runs. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Stable, unique identifier.
    pub key: String,
    /// Remote reference: full URL for assemblies, bare accession otherwise.
    pub source: String,
    /// Destination path for the fetched artifact.
    pub dest: PathBuf,
    /// Source kind, drives validation and fetcher selection.
    pub kind: SourceKind,
}

impl WorkItem {
    /// Build an assembly item from an FTP/HTTP directory path.
    ///
    /// NCBI assembly directories contain a genomic FASTA named after the
    /// directory itself: `<dir>/<basename>_genomic.fna.gz`.
    pub fn assembly(dir_path: &str, outdir: &Path) -> Self {
        let trimmed = dir_path.trim_end_matches('/');
        let basename = trimmed.rsplit('/').next().unwrap_or(trimmed);
        let file_name = format!("{basename}_genomic.fna.gz");
        Self {
            key: file_name.clone(),
            source: format!("{trimmed}/{file_name}"),
            dest: outdir.join(&file_name),
            kind: SourceKind::Assembly,
        }
    }

    /// Build a sequence item from an NCBI nucleotide accession.
    pub fn accession(accession: &str, outdir: &Path) -> Self {
        let accession = accession.trim().to_string();
        Self {
            key: accession.clone(),
            source: accession.clone(),
            dest: outdir.join(format!("{accession}.fasta")),
            kind: SourceKind::Accession,
        }
    }

    /// Validate the source reference.
    ///
    /// Items that fail validation are recorded as permanent failures rather
    /// than silently dropped.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            SourceKind::Assembly => {
                let has_scheme = ["ftp://", "http://", "https://"]
                    .iter()
                    .any(|scheme| self.source.starts_with(scheme));
                if has_scheme {
                    Ok(())
                } else {
                    Err(GenofetchError::InvalidSource(format!(
                        "not an ftp/http/https URL: {}",
                        self.source
                    )))
                }
            }
            SourceKind::Accession => {
                if ACCESSION_RE.is_match(&self.source) {
                    Ok(())
                } else {
                    Err(GenofetchError::InvalidSource(format!(
                        "not a valid NCBI nucleotide accession: {}",
                        self.source
                    )))
                }
            }
        }
    }
}

/// Pipeline stage that completed before a partial outcome was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Transform,
}

/// Terminal result of processing one work item.
///
/// Recorded in the checkpoint; a `Success` is never reprocessed by a later
/// run unless the caller forces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        result_path: PathBuf,
        attempts: u32,
    },
    /// Fetch succeeded but a later stage failed; the fetched artifact is
    /// kept so a resumed run retries only the remaining stage.
    Partial {
        stage: Stage,
        result_path: PathBuf,
        error: String,
        attempts: u32,
    },
    Failed {
        kind: ErrorKind,
        error: String,
        attempts: u32,
    },
}

impl Outcome {
    /// Terminal success, eligible for checkpoint skip.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Number of fetch attempts this outcome took.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::Partial { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// Error message, if this outcome carries one.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Partial { error, .. } | Self::Failed { error, .. } => Some(error),
        }
    }
}

/// A failed item surfaced in the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub key: String,
    pub error: String,
}

/// Aggregated result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Items in the materialized input list.
    pub total: usize,
    /// Items that reached terminal success in this run.
    pub succeeded: usize,
    /// Items that failed or remained partial in this run.
    pub failed: usize,
    /// Items skipped because the checkpoint already showed terminal success.
    pub skipped: usize,
    /// Failed items with their last error message.
    pub failures: Vec<FailedItem>,
    /// Wall-clock runtime in seconds.
    pub runtime_secs: f64,
}

impl RunSummary {
    /// True when the run produced no failures.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// True when a non-empty input produced neither successes nor skips,
    /// which signals a configuration problem rather than item-level flakiness.
    pub fn is_total_failure(&self) -> bool {
        self.total > 0 && self.succeeded == 0 && self.skipped == 0 && self.failed > 0
    }
}
