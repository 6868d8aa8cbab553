//! # Artifact Archive
//!
//! Files emitted documents into per-type folders on the archival service.
//! Filing is best effort: checkout logs a failure and moves on, since the
//! document is already legally emitted.

use async_trait::async_trait;
use caja_core::DocumentType;
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{http_client, parse_endpoint, status_error, EmissionError, EmissionResult};

/// Body posted to the archival service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub folder_name: String,
    pub artifact_url: String,
    /// Local business date of the sale.
    pub logical_date: NaiveDate,
}

impl ArchiveEntry {
    /// Entry for a document, filed under `{root}/{document type}`.
    pub fn for_document(
        root_folder: &str,
        document_type: DocumentType,
        artifact_url: &str,
        logical_date: NaiveDate,
    ) -> Self {
        ArchiveEntry {
            folder_name: format!("{}/{}", root_folder.trim_end_matches('/'), document_type.as_str()),
            artifact_url: artifact_url.to_string(),
            logical_date,
        }
    }
}

#[async_trait]
pub trait ArtifactArchive: Send + Sync {
    async fn file(&self, entry: &ArchiveEntry) -> EmissionResult<()>;
}

/// [`ArtifactArchive`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpArchive {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpArchive {
    pub fn new(endpoint: &str, timeout: Duration) -> EmissionResult<Self> {
        Ok(HttpArchive {
            client: http_client(timeout)?,
            endpoint: parse_endpoint(endpoint)?,
            timeout,
        })
    }
}

#[async_trait]
impl ArtifactArchive for HttpArchive {
    async fn file(&self, entry: &ArchiveEntry) -> EmissionResult<()> {
        debug!(folder = %entry.folder_name, url = %entry.artifact_url, "Filing artifact");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(entry)
            .send()
            .await
            .map_err(|e| EmissionError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}
