//! Bounded worker pool driving item processing.

use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::models::{FailedItem, GenofetchError, Outcome, Result, RunSummary, WorkItem};
use crate::pool::ItemProcessor;
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Fixed-width pool of concurrent item executors.
///
/// Items are dispatched as Tokio tasks gated by a semaphore, so at most
/// `size` external operations are in flight. Completion order is
/// arbitrary. Every outcome is written to the checkpoint store before the
/// item counts as done; a store write failure aborts the run, because
/// resumability guarantees are meaningless without a working store.
pub struct WorkerPool {
    processor: Arc<dyn ItemProcessor>,
    store: Arc<CheckpointStore>,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(processor: Arc<dyn ItemProcessor>, store: Arc<CheckpointStore>, size: usize) -> Self {
        Self {
            processor,
            store,
            semaphore: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Process `items`, recording each outcome, and aggregate counts.
    ///
    /// The returned summary covers only the items given here; the caller
    /// fills in `total` and `skipped` from its checkpoint partition.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        progress: Option<ProgressBar>,
    ) -> Result<RunSummary> {
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let processor = Arc::clone(&self.processor);
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&self.semaphore);
            let key = item.key.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| GenofetchError::Internal("semaphore closed".to_string()))?;
                let outcome = processor.process(&item).await;
                // Durably recorded before the item is reported complete.
                store.put(CheckpointRecord::new(&item, outcome.clone()))?;
                Ok::<Outcome, GenofetchError>(outcome)
            });
            handles.push((key, handle));
        }

        let mut summary = RunSummary::default();
        for (key, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => {
                    if outcome.is_success() {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                        summary.failures.push(FailedItem {
                            key: key.clone(),
                            error: outcome.error().unwrap_or("unknown error").to_string(),
                        });
                        warn!(key = %key, error = outcome.error(), "Item failed");
                    }
                }
                // Checkpoint write failure: run-fatal.
                Ok(Err(e)) => return Err(e),
                Err(e) => {
                    warn!(key = %key, error = %e, "Worker task panicked");
                    summary.failed += 1;
                    summary.failures.push(FailedItem {
                        key,
                        error: format!("worker task panicked: {e}"),
                    });
                }
            }
            if let Some(pb) = &progress {
                pb.inc(1);
                pb.set_message(format!(
                    "ok: {}, failed: {}",
                    summary.succeeded, summary.failed
                ));
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorKind, SourceKind};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Processor that succeeds or fails based on the item key.
    struct KeyedProcessor;

    #[async_trait]
    impl ItemProcessor for KeyedProcessor {
        async fn process(&self, item: &WorkItem) -> Outcome {
            if item.key.starts_with("bad") {
                Outcome::Failed {
                    kind: ErrorKind::Transient,
                    error: "scripted failure".into(),
                    attempts: 3,
                }
            } else {
                Outcome::Success {
                    result_path: item.dest.clone(),
                    attempts: 1,
                }
            }
        }
    }

    struct PanickingProcessor;

    #[async_trait]
    impl ItemProcessor for PanickingProcessor {
        async fn process(&self, _item: &WorkItem) -> Outcome {
            panic!("scripted panic");
        }
    }

    fn items(keys: &[&str]) -> Vec<WorkItem> {
        keys.iter()
            .map(|key| WorkItem {
                key: key.to_string(),
                source: format!("https://example.org/{key}"),
                dest: PathBuf::from(format!("out/{key}")),
                kind: SourceKind::Assembly,
            })
            .collect()
    }

    fn store(dir: &TempDir) -> Arc<CheckpointStore> {
        Arc::new(CheckpointStore::open(dir.path().join("checkpoint.json")).unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn outcomes_are_checkpointed_and_counted() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let pool = WorkerPool::new(Arc::new(KeyedProcessor), Arc::clone(&store), 4);

        let summary = pool
            .run(items(&["a", "b", "bad_c", "d"]), None)
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].key, "bad_c");

        // One durable record per item, including the failure.
        assert_eq!(store.len(), 4);
        assert!(store.get("a").unwrap().outcome.is_success());
        assert!(!store.get("bad_c").unwrap().outcome.is_success());
        assert_eq!(store.get("bad_c").unwrap().outcome.attempts(), 3);
    }

    #[tokio::test]
    async fn panicking_worker_is_counted_without_deadlock() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(Arc::new(PanickingProcessor), store(&dir), 2);

        let summary = pool.run(items(&["a", "b"]), None).await.unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 2);
        assert!(summary.failures[0].error.contains("panicked"));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_summary() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(Arc::new(KeyedProcessor), store(&dir), 2);

        let summary = pool.run(Vec::new(), None).await.unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
    }
}
