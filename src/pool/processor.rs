//! Per-item processing: fetch, verify, optional transform.

use crate::fetch::{Fetcher, RetryPolicy, Transformer};
use crate::models::{GenofetchError, Outcome, Stage, WorkItem};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Polymorphic per-item operation.
///
/// Implementations convert every failure into an [`Outcome`]; nothing an
/// item does may abort the surrounding run.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: &WorkItem) -> Outcome;
}

/// Fetch-and-transform processor.
///
/// Per item:
/// 1. short-circuit when the final artifact already exists non-empty
///    (unless forced);
/// 2. fetch under the retry policy and per-attempt timeout, writing to a
///    `.part` temp name and renaming only after the artifact is verified
///    non-empty;
/// 3. run the transform, if configured, only after a successful fetch; a
///    transform failure keeps the fetched artifact and yields a partial
///    outcome so a rerun retries just the transform.
pub struct FetchProcessor {
    fetcher: Arc<dyn Fetcher>,
    transform: Option<Arc<dyn Transformer>>,
    retry: RetryPolicy,
    timeout: Duration,
    force: bool,
}

/// A fetch failure together with how many attempts it consumed.
struct AttemptError {
    error: GenofetchError,
    attempts: u32,
}

impl FetchProcessor {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            fetcher,
            transform: None,
            retry,
            timeout,
            force: false,
        }
    }

    /// Attach a transform stage (e.g. decompression).
    pub fn with_transform(mut self, transform: Arc<dyn Transformer>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Reprocess items even when their artifacts already exist.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    fn final_path(&self, item: &WorkItem) -> PathBuf {
        match &self.transform {
            Some(t) => t.output_path(&item.dest),
            None => item.dest.clone(),
        }
    }

    /// Fetch `item.source` into `item.dest` under the retry policy.
    ///
    /// Each attempt writes to a sibling `.part` file; only a verified
    /// non-empty artifact is renamed into place, so a failed fetch never
    /// publishes a truncated destination.
    async fn fetch_with_retry(&self, item: &WorkItem) -> Result<u32, AttemptError> {
        let temp = part_path(&item.dest);
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let result = match tokio::time::timeout(
                self.timeout,
                self.fetcher.fetch(&item.source, &temp),
            )
            .await
            {
                Ok(r) => r,
                Err(_) => Err(GenofetchError::Timeout(self.timeout)),
            };

            let error = match result {
                Ok(()) => match std::fs::metadata(&temp) {
                    Ok(meta) if meta.len() > 0 => match std::fs::rename(&temp, &item.dest) {
                        Ok(()) => return Ok(attempt),
                        Err(e) => {
                            GenofetchError::io(format!("publishing {}", item.dest.display()), e)
                        }
                    },
                    // Transport-level success with zero bytes is a silent
                    // partial download.
                    _ => GenofetchError::EmptyArtifact(item.dest.clone()),
                },
                Err(e) => e,
            };

            let _ = std::fs::remove_file(&temp);

            if !self.retry.should_retry(attempt, &error) {
                return Err(AttemptError {
                    error,
                    attempts: attempt,
                });
            }

            let delay = self.retry.backoff_delay(attempt);
            warn!(
                key = %item.key,
                attempt,
                delay_secs = delay.as_secs_f64(),
                error = %error,
                "Fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ItemProcessor for FetchProcessor {
    async fn process(&self, item: &WorkItem) -> Outcome {
        if let Err(error) = item.validate() {
            return Outcome::Failed {
                kind: error.kind(),
                error: error.to_string(),
                attempts: 0,
            };
        }

        let final_path = self.final_path(item);
        if !self.force && is_non_empty(&final_path) {
            debug!(key = %item.key, "Destination already satisfied, skipping fetch");
            return Outcome::Success {
                result_path: final_path,
                attempts: 0,
            };
        }

        // A fetched-but-untransformed artifact from an earlier partial run
        // only needs the transform redone.
        let mut attempts = 0;
        if self.force || !is_non_empty(&item.dest) {
            attempts = match self.fetch_with_retry(item).await {
                Ok(n) => n,
                Err(failure) => {
                    return Outcome::Failed {
                        kind: failure.error.kind(),
                        error: failure.error.to_string(),
                        attempts: failure.attempts,
                    };
                }
            };
        }

        let Some(transform) = &self.transform else {
            return Outcome::Success {
                result_path: item.dest.clone(),
                attempts,
            };
        };

        match transform.transform(&item.dest).await {
            Ok(result_path) => Outcome::Success {
                result_path,
                attempts,
            },
            Err(error) => Outcome::Partial {
                stage: Stage::Fetch,
                result_path: item.dest.clone(),
                error: error.to_string(),
                attempts,
            },
        }
    }
}

/// Temp name used while an item is being fetched.
pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn is_non_empty(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Fetcher scripted to fail a fixed number of times per source before
    /// writing `payload` to the destination.
    struct ScriptedFetcher {
        fail_first: u32,
        payload: &'static [u8],
        calls: Mutex<HashMap<String, u32>>,
    }

    impl ScriptedFetcher {
        fn new(fail_first: u32, payload: &'static [u8]) -> Self {
            Self {
                fail_first,
                payload,
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls_for(&self, source: &str) -> u32 {
            *self.calls.lock().unwrap().get(source).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, source: &str, dest: &Path) -> crate::models::Result<()> {
            let count = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(source.to_string()).or_insert(0);
                *entry += 1;
                *entry
            };
            if count <= self.fail_first {
                return Err(GenofetchError::UpstreamStatus {
                    status: 503,
                    message: "temporarily unavailable".into(),
                });
            }
            std::fs::write(dest, self.payload).unwrap();
            Ok(())
        }
    }

    /// Transform that always fails, for partial-outcome tests.
    struct FailingTransform;

    #[async_trait]
    impl Transformer for FailingTransform {
        fn output_path(&self, input: &Path) -> PathBuf {
            input.with_extension("")
        }

        async fn transform(&self, _input: &Path) -> crate::models::Result<PathBuf> {
            Err(GenofetchError::CommandFailed {
                program: "pigz".into(),
                code: Some(1),
                stderr: "corrupt stream".into(),
            })
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            pause: Duration::ZERO,
        }
    }

    fn assembly_item(dir: &TempDir) -> WorkItem {
        WorkItem::assembly("https://example.org/genomes/GCF_1_Asm", dir.path())
    }

    fn processor(fetcher: Arc<dyn Fetcher>, max_attempts: u32) -> FetchProcessor {
        FetchProcessor::new(fetcher, fast_retry(max_attempts), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn transient_failures_then_success_records_attempts() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(2, b">seq\nACGT\n"));
        let item = assembly_item(&dir);

        let outcome = processor(fetcher.clone(), 3).process(&item).await;
        match outcome {
            Outcome::Success {
                result_path,
                attempts,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(result_path, item.dest);
                assert!(item.dest.exists());
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(fetcher.calls_for(&item.source), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_with_attempt_count() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(10, b"unused"));
        let item = assembly_item(&dir);

        let outcome = processor(fetcher, 3).process(&item).await;
        match outcome {
            Outcome::Failed {
                kind, attempts, ..
            } => {
                assert_eq!(kind, ErrorKind::Transient);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!item.dest.exists());
        assert!(!part_path(&item.dest).exists());
    }

    #[tokio::test]
    async fn zero_byte_artifact_is_rejected() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(0, b""));
        let item = assembly_item(&dir);

        let outcome = processor(fetcher, 2).process(&item).await;
        match outcome {
            Outcome::Failed { kind, error, .. } => {
                assert_eq!(kind, ErrorKind::Transient);
                assert!(error.contains("empty"), "{error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // The truncated artifact must never be published.
        assert!(!item.dest.exists());
        assert!(!part_path(&item.dest).exists());
    }

    #[tokio::test]
    async fn existing_destination_short_circuits() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(0, b"fresh"));
        let item = assembly_item(&dir);
        std::fs::write(&item.dest, b"already here").unwrap();

        let outcome = processor(fetcher.clone(), 3).process(&item).await;
        assert!(matches!(outcome, Outcome::Success { attempts: 0, .. }));
        assert_eq!(fetcher.calls_for(&item.source), 0);
        assert_eq!(std::fs::read(&item.dest).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn force_refetches_existing_destination() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(0, b"fresh"));
        let item = assembly_item(&dir);
        std::fs::write(&item.dest, b"stale").unwrap();

        let outcome = processor(fetcher.clone(), 3)
            .with_force(true)
            .process(&item)
            .await;
        assert!(matches!(outcome, Outcome::Success { attempts: 1, .. }));
        assert_eq!(std::fs::read(&item.dest).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn transform_failure_yields_partial_and_keeps_fetch() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(0, b"gzipped bytes"));
        let item = assembly_item(&dir);

        let outcome = processor(fetcher, 3)
            .with_transform(Arc::new(FailingTransform))
            .process(&item)
            .await;
        match outcome {
            Outcome::Partial {
                stage,
                result_path,
                attempts,
                ..
            } => {
                assert_eq!(stage, Stage::Fetch);
                assert_eq!(result_path, item.dest);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected partial, got {other:?}"),
        }
        // Fetched artifact survives so a rerun can retry only the transform.
        assert!(item.dest.exists());
    }

    #[tokio::test]
    async fn partial_rerun_skips_fetch_and_retries_transform() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(0, b"unused"));
        let item = assembly_item(&dir);
        std::fs::write(&item.dest, b"fetched earlier").unwrap();

        let outcome = processor(fetcher.clone(), 3)
            .with_transform(Arc::new(FailingTransform))
            .process(&item)
            .await;
        assert!(matches!(outcome, Outcome::Partial { attempts: 0, .. }));
        assert_eq!(fetcher.calls_for(&item.source), 0);
    }

    #[tokio::test]
    async fn invalid_source_is_a_permanent_failure() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(0, b"unused"));
        let item = WorkItem::accession("not-an-accession", dir.path());

        let outcome = processor(fetcher.clone(), 3).process(&item).await;
        match outcome {
            Outcome::Failed {
                kind, attempts, ..
            } => {
                assert_eq!(kind, ErrorKind::Permanent);
                assert_eq!(attempts, 0);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(fetcher.calls_for(&item.source), 0);
    }

    #[tokio::test]
    async fn per_attempt_timeout_counts_as_transient() {
        struct HangingFetcher {
            calls: AtomicU32,
        }

        #[async_trait]
        impl Fetcher for HangingFetcher {
            async fn fetch(&self, _source: &str, _dest: &Path) -> crate::models::Result<()> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(HangingFetcher {
            calls: AtomicU32::new(0),
        });
        let item = assembly_item(&dir);

        let processor = FetchProcessor::new(
            fetcher.clone(),
            fast_retry(2),
            Duration::from_millis(10),
        );
        let outcome = processor.process(&item).await;
        match outcome {
            Outcome::Failed {
                kind,
                error,
                attempts,
            } => {
                assert_eq!(kind, ErrorKind::Transient);
                assert_eq!(attempts, 2);
                assert!(error.contains("timed out"), "{error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
