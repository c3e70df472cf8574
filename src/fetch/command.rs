//! Command-line tool collaborators.
//!
//! The download and decompression tools are invoked with structured
//! argument lists via `tokio::process`, never through a shell, and with
//! `kill_on_drop` so a cancelled run abandons the child promptly.

use crate::fetch::{Fetcher, Transformer};
use crate::models::{GenofetchError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

// wget reserves exit code 8 for server-issued errors (e.g. 404).
const WGET_SERVER_ERROR: i32 = 8;

/// Fetches a URL with an external download tool (wget by default).
pub struct CommandFetcher {
    program: String,
}

impl CommandFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Fetcher for CommandFetcher {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()> {
        debug!(source, dest = %dest.display(), tool = %self.program, "Invoking download tool");
        let output = Command::new(&self.program)
            .arg("-q")
            .arg("-O")
            .arg(dest)
            .arg(source)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GenofetchError::io(format!("spawning {}", self.program), e))?;

        if output.status.success() {
            return Ok(());
        }

        let code = output.status.code();
        if code == Some(WGET_SERVER_ERROR) {
            return Err(GenofetchError::NotFound(source.to_string()));
        }
        Err(GenofetchError::CommandFailed {
            program: self.program.clone(),
            code,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Decompresses `.gz` artifacts with an external tool (pigz by default).
///
/// Non-`.gz` inputs pass through untouched. `-f` overwrites a partial
/// output left by an interrupted earlier run.
pub struct CommandDecompressor {
    program: String,
}

impl CommandDecompressor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn is_gzip(input: &Path) -> bool {
        input.extension().is_some_and(|ext| ext == "gz")
    }
}

#[async_trait]
impl Transformer for CommandDecompressor {
    fn output_path(&self, input: &Path) -> PathBuf {
        if Self::is_gzip(input) {
            input.with_extension("")
        } else {
            input.to_path_buf()
        }
    }

    async fn transform(&self, input: &Path) -> Result<PathBuf> {
        if !Self::is_gzip(input) {
            return Ok(input.to_path_buf());
        }

        debug!(input = %input.display(), tool = %self.program, "Decompressing");
        let output = Command::new(&self.program)
            .arg("-d")
            .arg("-f")
            .arg(input)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GenofetchError::io(format!("spawning {}", self.program), e))?;

        if !output.status.success() {
            return Err(GenofetchError::CommandFailed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let produced = self.output_path(input);
        match std::fs::metadata(&produced) {
            Ok(meta) if meta.len() > 0 => Ok(produced),
            _ => Err(GenofetchError::EmptyArtifact(produced)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_strips_gz_suffix() {
        let decompressor = CommandDecompressor::new("pigz");
        assert_eq!(
            decompressor.output_path(Path::new("out/GCF_1_genomic.fna.gz")),
            Path::new("out/GCF_1_genomic.fna")
        );
        assert_eq!(
            decompressor.output_path(Path::new("out/NC_012345.1.fasta")),
            Path::new("out/NC_012345.1.fasta")
        );
    }

    #[tokio::test]
    async fn non_gzip_input_passes_through() {
        let decompressor = CommandDecompressor::new("pigz");
        let path = Path::new("out/NC_012345.1.fasta");
        assert_eq!(decompressor.transform(path).await.unwrap(), path);
    }

    #[tokio::test]
    async fn missing_tool_reports_spawn_error() {
        let fetcher = CommandFetcher::new("definitely-not-a-real-tool");
        let err = fetcher
            .fetch("https://example.org/a.fna.gz", Path::new("/tmp/a.fna.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenofetchError::Io { .. }));
    }
}
