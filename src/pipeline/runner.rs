//! Pipeline orchestration.
//!
//! Flow: load checkpoint → partition items against recorded successes →
//! sweep stale partial downloads → drive the worker pool → flush the
//! checkpoint and aggregate the run summary.

use crate::checkpoint::CheckpointStore;
use crate::models::{GenofetchError, Result, RunSummary, WorkItem};
use crate::pool::{ItemProcessor, WorkerPool};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Orchestrates one checkpointed pipeline run.
pub struct PipelineRunner {
    processor: Arc<dyn ItemProcessor>,
    store: Arc<CheckpointStore>,
    workers: usize,
    force: bool,
    show_progress: bool,
}

impl PipelineRunner {
    pub fn new(
        processor: Arc<dyn ItemProcessor>,
        store: Arc<CheckpointStore>,
        workers: usize,
    ) -> Self {
        Self {
            processor,
            store,
            workers,
            force: false,
            show_progress: true,
        }
    }

    /// Reprocess items even when the checkpoint shows terminal success.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Disable the progress bar (tests, non-interactive runs).
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run the pipeline over a materialized item list.
    ///
    /// Per-item failures are aggregated into the summary, never raised;
    /// only checkpoint-store I/O failures abort the run.
    pub async fn execute(&self, items: Vec<WorkItem>) -> Result<RunSummary> {
        let start = Instant::now();
        let total = items.len();

        let (pending, skipped) = self.partition(items);
        info!(
            total,
            pending = pending.len(),
            skipped,
            workers = self.workers,
            "Starting fetch pipeline"
        );

        if pending.is_empty() {
            info!("All items already fetched, nothing to do");
            return Ok(RunSummary {
                total,
                skipped,
                runtime_secs: start.elapsed().as_secs_f64(),
                ..Default::default()
            });
        }

        self.prepare_destinations(&pending)?;
        sweep_partials(&pending);

        let progress = if self.show_progress {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                    .map_err(|e| GenofetchError::Internal(format!("progress template: {e}")))?
                    .progress_chars("##-"),
            );
            pb.set_position(skipped as u64);
            Some(pb)
        } else {
            None
        };

        let pool = WorkerPool::new(
            Arc::clone(&self.processor),
            Arc::clone(&self.store),
            self.workers,
        );
        let mut summary = pool.run(pending, progress.clone()).await?;
        summary.total = total;
        summary.skipped = skipped;
        summary.runtime_secs = start.elapsed().as_secs_f64();

        if let Some(pb) = progress {
            pb.finish_with_message(format!(
                "done: {} ok, {} failed, {} skipped",
                summary.succeeded, summary.failed, summary.skipped
            ));
        }

        // Final save so a run that only skipped still leaves a fresh file.
        self.store.flush()?;

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            runtime_secs = format!("{:.1}", summary.runtime_secs),
            "Fetch pipeline complete"
        );
        Ok(summary)
    }

    /// Split items into pending work and checkpoint-satisfied skips.
    fn partition(&self, items: Vec<WorkItem>) -> (Vec<WorkItem>, usize) {
        if self.force {
            return (items, 0);
        }
        let mut pending = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            let done = self
                .store
                .get(&item.key)
                .is_some_and(|record| record.outcome.is_success());
            if done {
                skipped += 1;
            } else {
                pending.push(item);
            }
        }
        (pending, skipped)
    }

    fn prepare_destinations(&self, items: &[WorkItem]) -> Result<()> {
        for dir in destination_dirs(items) {
            std::fs::create_dir_all(&dir)
                .map_err(|e| GenofetchError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }
}

fn destination_dirs(items: &[WorkItem]) -> HashSet<PathBuf> {
    items
        .iter()
        .filter_map(|item| item.dest.parent())
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Remove `.part` files left behind by an interrupted run.
///
/// Partial downloads are never published, so anything matching the temp
/// pattern in a destination directory is stale.
fn sweep_partials(items: &[WorkItem]) {
    for dir in destination_dirs(items) {
        let pattern = dir.join("*.part");
        let Ok(paths) = glob::glob(&pattern.to_string_lossy()) else {
            continue;
        };
        for path in paths.flatten() {
            debug!(path = %path.display(), "Removing stale partial download");
            let _ = std::fs::remove_file(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use crate::pool::FetchProcessor;
    use crate::fetch::{Fetcher, RetryPolicy};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, _source: &str, dest: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(dest, b">seq\nACGT\n").unwrap();
            Ok(())
        }
    }

    fn runner(dir: &TempDir, fetcher: Arc<CountingFetcher>) -> (PipelineRunner, Arc<CheckpointStore>) {
        let store = Arc::new(
            CheckpointStore::open(dir.path().join("logs/checkpoint.json")).unwrap(),
        );
        let processor = FetchProcessor::new(
            fetcher,
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::ZERO,
                pause: Duration::ZERO,
            },
            Duration::from_secs(5),
        );
        let runner = PipelineRunner::new(Arc::new(processor), Arc::clone(&store), 2)
            .with_progress(false);
        (runner, store)
    }

    fn assembly_items(dir: &TempDir, names: &[&str]) -> Vec<WorkItem> {
        names
            .iter()
            .map(|name| {
                WorkItem::assembly(
                    &format!("https://example.org/genomes/{name}"),
                    &dir.path().join("out"),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn stale_partials_are_swept_before_the_run() {
        let dir = TempDir::new().unwrap();
        let outdir = dir.path().join("out");
        std::fs::create_dir_all(&outdir).unwrap();
        let stale = outdir.join("GCF_9_Asm_genomic.fna.gz.part");
        std::fs::write(&stale, b"half a download").unwrap();

        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicU32::new(0),
        });
        let (runner, _) = runner(&dir, fetcher);
        runner
            .execute(assembly_items(&dir, &["GCF_1_Asm"]))
            .await
            .unwrap();
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn checkpointed_successes_are_skipped() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicU32::new(0),
        });
        let (runner, store) = runner(&dir, Arc::clone(&fetcher));
        let items = assembly_items(&dir, &["GCF_1_Asm", "GCF_2_Asm", "GCF_3_Asm"]);

        // Pretend GCF_2 finished in an earlier run.
        store
            .put(crate::checkpoint::CheckpointRecord::new(
                &items[1],
                Outcome::Success {
                    result_path: items[1].dest.clone(),
                    attempts: 1,
                },
            ))
            .unwrap();

        let summary = runner.execute(items).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_input_completes_cleanly() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicU32::new(0),
        });
        let (runner, _) = runner(&dir, fetcher);
        let summary = runner.execute(Vec::new()).await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.is_clean());
        assert!(!summary.is_total_failure());
    }
}
