//! Work-item materialization from plain-text source lists.

use crate::models::{GenofetchError, Result, WorkItem};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Read one source reference per line; blank lines are ignored.
pub fn read_source_list(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .map_err(|e| GenofetchError::io(format!("opening source list {}", path.display()), e))?;
    let reader = BufReader::new(file);

    let mut sources = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| GenofetchError::io("reading source list", e))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            sources.push(trimmed.to_string());
        }
    }

    info!(count = sources.len(), path = %path.display(), "Loaded source list");
    Ok(sources)
}

/// Materialize assembly work items from FTP/HTTP directory paths.
///
/// Duplicate keys are dropped (first occurrence wins) so keys stay unique
/// within a run.
pub fn assembly_items(paths: &[String], outdir: &Path) -> Vec<WorkItem> {
    dedup_by_key(paths.iter().map(|p| WorkItem::assembly(p, outdir)))
}

/// Materialize sequence work items from nucleotide accessions.
pub fn accession_items(accessions: &[String], outdir: &Path) -> Vec<WorkItem> {
    dedup_by_key(accessions.iter().map(|a| WorkItem::accession(a, outdir)))
}

fn dedup_by_key(items: impl Iterator<Item = WorkItem>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        if seen.insert(item.key.clone()) {
            unique.push(item);
        } else {
            warn!(key = %item.key, "Duplicate source entry, keeping first");
        }
    }
    unique
}
