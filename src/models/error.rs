//! Error types for genofetch.
//!
//! Every error carries a [`ErrorKind`] that drives retry decisions and
//! checkpoint records:
//! - `Transient`: external hiccup (timeout, network, tool exit) — retryable
//! - `Permanent`: bad input or missing resource — never retried
//! - `LocalIo`: local filesystem trouble — fails the item, or the whole run
//!   when it hits the checkpoint store itself
//! - `Unexpected`: anything uncaught — item-scoped, never aborts the run

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for genofetch.
#[derive(Debug, Error)]
pub enum GenofetchError {
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("{program} exited with code {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Fetched artifact is empty: {0}")]
    EmptyArtifact(PathBuf),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Error classification recorded in checkpoint entries and consulted by
/// [`crate::fetch::RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
    LocalIo,
    Unexpected,
}

impl GenofetchError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error for retry and checkpoint purposes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::InvalidSource(_) | Self::NotFound(_) => ErrorKind::Permanent,
            Self::Timeout(_)
            | Self::Network(_)
            | Self::UpstreamStatus { .. }
            | Self::CommandFailed { .. }
            | Self::EmptyArtifact(_) => ErrorKind::Transient,
            Self::Io { .. } | Self::Checkpoint(_) => ErrorKind::LocalIo,
            Self::Internal(_) | Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Check if this error is retryable within a run.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Result type alias for genofetch.
pub type Result<T> = std::result::Result<T, GenofetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(GenofetchError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(
            GenofetchError::UpstreamStatus {
                status: 503,
                message: "unavailable".into(),
            }
            .is_retryable()
        );
        assert!(GenofetchError::EmptyArtifact(PathBuf::from("x.fna.gz")).is_retryable());
    }

    #[test]
    fn permanent_and_local_errors_are_not_retryable() {
        assert!(!GenofetchError::InvalidSource("bogus".into()).is_retryable());
        assert!(!GenofetchError::NotFound("GCF_0".into()).is_retryable());
        assert!(
            !GenofetchError::io("writing", std::io::Error::other("disk full")).is_retryable()
        );
        assert_eq!(
            GenofetchError::Unexpected("panic".into()).kind(),
            ErrorKind::Unexpected
        );
    }
}
