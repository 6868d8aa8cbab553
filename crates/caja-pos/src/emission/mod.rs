//! # External Document Services
//!
//! HTTP collaborators of checkout.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CheckoutService                                                        │
//! │       │                                                                 │
//! │       ├── DocumentEmitter::emit(envelope) ──► emission service          │
//! │       │      required; failure aborts the sale                          │
//! │       │                                                                 │
//! │       └── ArtifactArchive::file(entry) ─────► folder/archival service   │
//! │              best effort; failure is logged                             │
//! │                                                                         │
//! │  CatalogService                                                         │
//! │       └── MediaUploader::upload(bytes) ─────► media upload service      │
//! │                                                                         │
//! │  Each collaborator is a trait so checkout can run against fakes.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod archive;
pub mod client;
pub mod envelope;
pub mod upload;

use std::time::Duration;
use thiserror::Error;

pub use archive::{ArchiveEntry, ArtifactArchive, HttpArchive};
pub use client::{DocumentEmitter, EmissionResponse, EmittedDocument, HttpEmitter};
pub use envelope::DocumentEnvelope;
pub use upload::{HttpUploader, MediaUploader};

/// Failures talking to an external document service.
#[derive(Debug, Error)]
pub enum EmissionError {
    /// Connection refused, DNS failure, TLS error...
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response.
    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response with `ok: false`.
    #[error("Service rejected the document: {0}")]
    Rejected(String),

    /// Body could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl EmissionError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            EmissionError::Timeout(timeout)
        } else {
            EmissionError::Transport(err.to_string())
        }
    }
}

pub type EmissionResult<T> = Result<T, EmissionError>;

/// Builds the shared HTTP client with a request timeout.
pub(crate) fn http_client(timeout: Duration) -> EmissionResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EmissionError::Transport(e.to_string()))
}

pub(crate) fn parse_endpoint(raw: &str) -> EmissionResult<url::Url> {
    url::Url::parse(raw).map_err(|e| EmissionError::InvalidEndpoint(format!("{}: {}", raw, e)))
}

/// Reads a non-2xx response into `EmissionError::Status`.
pub(crate) async fn status_error(response: reqwest::Response) -> EmissionError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
    EmissionError::Status { status, body }
}
