//! Durable per-item progress records.
//!
//! The store holds one record per work-item key behind a mutex; every `put`
//! rewrites the whole file through a temp-file-plus-rename so a crash mid
//! flush leaves the previous complete state intact. Corrupt or missing
//! checkpoint files forfeit prior progress but never abort a run.

use crate::models::{GenofetchError, Outcome, Result, WorkItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Checkpoint entry for a single work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Work-item key.
    pub key: String,
    /// Remote source reference.
    pub source: String,
    /// Last known outcome.
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Timestamp of last update.
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Build a record for an item's freshly produced outcome.
    pub fn new(item: &WorkItem, outcome: Outcome) -> Self {
        Self {
            key: item.key.clone(),
            source: item.source.clone(),
            outcome,
            updated_at: Utc::now(),
        }
    }
}

/// On-disk checkpoint layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointSnapshot {
    records: HashMap<String, CheckpointRecord>,
}

/// Durable, crash-consistent record of per-item status.
///
/// Shared across workers; all mutation goes through the serialized [`put`].
///
/// [`put`]: CheckpointStore::put
pub struct CheckpointStore {
    path: PathBuf,
    temp_path: PathBuf,
    records: Mutex<HashMap<String, CheckpointRecord>>,
}

impl CheckpointStore {
    /// Open a store at `path`, loading any prior records.
    ///
    /// Loading fails soft: a missing file starts empty, and unparseable
    /// content is discarded with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| GenofetchError::io("creating checkpoint dir", e))?;
            }
        }

        let records = Self::load_records(&path);
        let temp_path = path.with_extension("json.tmp");
        Ok(Self {
            path,
            temp_path,
            records: Mutex::new(records),
        })
    }

    fn load_records(path: &Path) -> HashMap<String, CheckpointRecord> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return HashMap::new(),
        };
        match serde_json::from_reader::<_, CheckpointSnapshot>(BufReader::new(file)) {
            Ok(snapshot) => {
                debug!(
                    records = snapshot.records.len(),
                    path = %path.display(),
                    "Loaded checkpoint"
                );
                snapshot.records
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Checkpoint unreadable, discarding prior progress"
                );
                HashMap::new()
            }
        }
    }

    /// Get the last recorded outcome for a key.
    pub fn get(&self, key: &str) -> Option<CheckpointRecord> {
        self.records.lock().ok()?.get(key).cloned()
    }

    /// Record an outcome and flush the full record set to disk.
    ///
    /// Safe to call from concurrent completion callbacks; the lock covers
    /// both the map update and the flush so two puts never interleave a
    /// partial write. Durable storage reflects the record before this
    /// returns.
    pub fn put(&self, record: CheckpointRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| GenofetchError::Internal("checkpoint lock poisoned".to_string()))?;
        records.insert(record.key.clone(), record);
        self.flush_locked(&records)
    }

    /// Flush the current record set to disk.
    pub fn flush(&self) -> Result<()> {
        let records = self
            .records
            .lock()
            .map_err(|_| GenofetchError::Internal("checkpoint lock poisoned".to_string()))?;
        self.flush_locked(&records)
    }

    fn flush_locked(&self, records: &HashMap<String, CheckpointRecord>) -> Result<()> {
        let file = File::create(&self.temp_path)
            .map_err(|e| GenofetchError::io("creating temp checkpoint", e))?;
        let mut writer = BufWriter::new(file);
        let snapshot = SnapshotRef { records };
        serde_json::to_writer_pretty(&mut writer, &snapshot)
            .map_err(|e| GenofetchError::Checkpoint(format!("serializing checkpoint: {e}")))?;
        writer
            .flush()
            .map_err(|e| GenofetchError::io("flushing checkpoint", e))?;

        // Atomic rename: readers and crashes only ever see a complete file.
        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| GenofetchError::io("renaming checkpoint", e))?;
        debug!(records = records.len(), "Checkpoint saved");
        Ok(())
    }

    /// Number of recorded items.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// True when no items have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checkpoint file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Borrowing twin of [`CheckpointSnapshot`] so flushing avoids cloning the map.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    records: &'a HashMap<String, CheckpointRecord>,
}
