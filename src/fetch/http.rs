//! NCBI E-utils sequence fetcher.

use crate::fetch::Fetcher;
use crate::models::{GenofetchError, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Downloads nucleotide FASTA records via the E-utils `efetch` endpoint.
///
/// The source reference is a bare accession; the fetcher builds the query.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    /// Create a fetcher against the given E-utils base URL.
    ///
    /// No client-level timeout is set; the processor enforces the
    /// per-attempt timeout around the whole fetch.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(GenofetchError::Network)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        debug!(accession = source, url = %url, "Fetching sequence");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "nuccore"),
                ("id", source),
                ("rettype", "fasta"),
                ("retmode", "text"),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            // 429 is server pushback, worth retrying; other 4xx mean the
            // accession itself is the problem.
            if status.is_client_error() && status.as_u16() != 429 {
                return Err(GenofetchError::NotFound(format!(
                    "{source}: HTTP {status}"
                )));
            }
            return Err(GenofetchError::UpstreamStatus {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let bytes = response.bytes().await.map_err(map_request_error)?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| GenofetchError::io(format!("writing {}", dest.display()), e))?;
        Ok(())
    }
}

fn map_request_error(e: reqwest::Error) -> GenofetchError {
    if e.is_timeout() {
        GenofetchError::Timeout(std::time::Duration::ZERO)
    } else {
        GenofetchError::Network(e)
    }
}
