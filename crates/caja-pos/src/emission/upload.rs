//! # Media Upload
//!
//! Sends a file to the media service. The service answers with free text
//! that contains the public URL somewhere in it; the first `http://` or
//! `https://` URL in the body is taken as the result.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{http_client, parse_endpoint, status_error, EmissionError, EmissionResult};

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Uploads `bytes` and returns the public URL.
    async fn upload(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> EmissionResult<String>;
}

/// [`MediaUploader`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpUploader {
    pub fn new(endpoint: &str, timeout: Duration) -> EmissionResult<Self> {
        Ok(HttpUploader {
            client: http_client(timeout)?,
            endpoint: parse_endpoint(endpoint)?,
            timeout,
        })
    }
}

#[async_trait]
impl MediaUploader for HttpUploader {
    async fn upload(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> EmissionResult<String> {
        debug!(file_name = %file_name, size = bytes.len(), "Uploading media");

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("filename", file_name);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| EmissionError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| EmissionError::InvalidResponse(e.to_string()))?;

        first_url(&body).ok_or_else(|| EmissionError::InvalidResponse("no URL in upload response".to_string()))
    }
}

/// First `http(s)://` URL in `text`, if any.
pub fn first_url(text: &str) -> Option<String> {
    let start = match (text.find("https://"), text.find("http://")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => return None,
    };

    let candidate: String = text[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '<' | '>' | '`'))
        .collect();
    let candidate = candidate.trim_end_matches(|c| matches!(c, ',' | '.' | ')' | ']' | '}' | ';'));

    Url::parse(candidate).ok().map(|url| url.to_string())
}
