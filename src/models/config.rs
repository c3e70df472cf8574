//! Configuration for genofetch.
//!
//! All tunables live in a TOML file; every field has a default so a missing
//! config file is equivalent to an empty one. CLI flags override the loaded
//! values at the binary boundary.

use crate::fetch::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External fetch/transform tooling and retry behavior.
    pub fetch: FetchConfig,

    /// Worker pool configuration.
    pub workers: WorkersConfig,

    /// Output settings.
    pub output: OutputConfig,

    /// Checkpoint settings.
    pub checkpoint: CheckpointConfig,
}

/// Fetch tooling and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Download tool invoked for assembly URLs.
    pub tool: String,

    /// Decompression tool invoked for `.gz` artifacts.
    pub decompress_tool: String,

    /// Base URL for NCBI E-utils (sequence downloads).
    pub eutils_base_url: String,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum fetch attempts per item.
    pub max_retries: u32,

    /// Exponential backoff base in seconds.
    pub backoff_base_secs: u64,

    /// Fixed pause between attempts, on top of backoff, to avoid hammering
    /// remote servers.
    pub retry_pause_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tool: "wget".to_string(),
            decompress_tool: "pigz".to_string(),
            eutils_base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            timeout_secs: 120,
            max_retries: 3,
            backoff_base_secs: 2,
            retry_pause_secs: 1,
        }
    }
}

impl FetchConfig {
    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_secs(self.backoff_base_secs),
            pause: Duration::from_secs(self.retry_pause_secs),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Pool width; 0 derives it from available parallelism.
    pub size: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { size: 0 }
    }
}

impl WorkersConfig {
    /// Resolve the pool width, deriving a bounded default when unset.
    pub fn resolve(&self) -> usize {
        if self.size > 0 {
            return self.size;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().min(8))
            .unwrap_or(4)
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for fetched artifacts.
    pub dir: PathBuf,

    /// Decompress fetched `.gz` artifacts.
    pub decompress: bool,

    /// Reprocess items even when the checkpoint shows terminal success.
    pub force: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("genomes"),
            decompress: false,
            force: false,
        }
    }
}

/// Checkpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Path of the checkpoint file.
    pub path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/checkpoint.json"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load the config file when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
