//! # Emission Client
//!
//! Posts a [`DocumentEnvelope`] to the document-emission service and reads
//! back the artifact URL.
//!
//! ## Outcomes
//! ```text
//! POST endpoint  (Authorization: Bearer <api_key> when configured)
//!   │
//!   ├── transport error / timeout ────────────► Err(Transport | Timeout)
//!   ├── HTTP 4xx / 5xx ───────────────────────► Err(Status)
//!   ├── 2xx { "ok": false, "error": "..." } ──► Err(Rejected)
//!   ├── 2xx { "ok": true } without URL ───────► Err(InvalidResponse)
//!   └── 2xx { "ok": true, "artifact_url" } ───► Ok(EmittedDocument)
//! ```
//!
//! There is no retry here. A second attempt is a new checkout with a new
//! folio.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::envelope::DocumentEnvelope;
use super::{http_client, parse_endpoint, status_error, EmissionError, EmissionResult};
use crate::config::EmissionConfig;

/// Body returned by the emission service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionResponse {
    pub ok: bool,
    #[serde(default)]
    pub artifact_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A successfully emitted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedDocument {
    /// Where the rendered document (PDF) can be fetched.
    pub artifact_url: String,
}

/// Anything that can turn an envelope into an emitted document.
#[async_trait]
pub trait DocumentEmitter: Send + Sync {
    async fn emit(&self, envelope: &DocumentEnvelope) -> EmissionResult<EmittedDocument>;
}

/// [`DocumentEmitter`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpEmitter {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpEmitter {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> EmissionResult<Self> {
        Ok(HttpEmitter {
            client: http_client(timeout)?,
            endpoint: parse_endpoint(endpoint)?,
            api_key,
            timeout,
        })
    }

    pub fn from_config(config: &EmissionConfig) -> EmissionResult<Self> {
        Self::new(&config.endpoint, config.api_key.clone(), config.timeout())
    }
}

#[async_trait]
impl DocumentEmitter for HttpEmitter {
    async fn emit(&self, envelope: &DocumentEnvelope) -> EmissionResult<EmittedDocument> {
        debug!(
            endpoint = %self.endpoint,
            document_type = %envelope.document_type,
            folio = ?envelope.folio,
            "Posting document to emission service"
        );

        let mut request = self.client.post(self.endpoint.clone()).json(envelope);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmissionError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let err = status_error(response).await;
            warn!(error = %err, "Emission service returned an error status");
            return Err(err);
        }

        let body: EmissionResponse = response
            .json()
            .await
            .map_err(|e| EmissionError::InvalidResponse(e.to_string()))?;

        if !body.ok {
            let reason = body.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(EmissionError::Rejected(reason));
        }

        match body.artifact_url {
            Some(url) if !url.trim().is_empty() => Ok(EmittedDocument { artifact_url: url }),
            _ => Err(EmissionError::InvalidResponse(
                "ok response without artifact_url".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caja_core::{
        BillingPeriod, Cart, CartProduct, Company, DocumentType, Money, PaymentMethod, Receiver,
        TaxId,
    };
    use chrono::NaiveDate;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope() -> DocumentEnvelope {
        let company = Company {
            id: "c-1".to_string(),
            tax_id: TaxId::parse("76.086.428-5").unwrap(),
            business_name: "Almacén La Esquina SpA".to_string(),
            giro: "Almacén".to_string(),
            address: "Los Aromos 455".to_string(),
            commune: "Ñuñoa".to_string(),
            credential_ref: Some("cert-demo".to_string()),
            plan_id: None,
            billing_period: BillingPeriod::Monthly,
        };
        let mut cart = Cart::new();
        cart.add_line(CartProduct::catalog("p-1", "Pan", Money::from_pesos(1_190), None))
            .unwrap();

        DocumentEnvelope::build(
            DocumentType::Boleta,
            Some(10),
            &company,
            Receiver::generic_consumer(),
            &cart,
            PaymentMethod::Cash,
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        )
    }

    fn emitter(server: &MockServer, api_key: Option<&str>) -> HttpEmitter {
        HttpEmitter::new(
            &format!("{}/documentos", server.uri()),
            api_key.map(str::to_string),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_emission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documentos"))
            .and(header("authorization", "Bearer secreto"))
            .and(body_partial_json(serde_json::json!({
                "folio": 10,
                "sii_code": 39,
                "totals": { "net": 1000, "tax": 190, "total": 1190 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "artifact_url": "https://docs.example/b-10.pdf"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let emitted = emitter(&server, Some("secreto")).emit(&envelope()).await.unwrap();
        assert_eq!(emitted.artifact_url, "https://docs.example/b-10.pdf");
    }

    #[tokio::test]
    async fn test_rejected_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "error": "CAF vencido"
            })))
            .mount(&server)
            .await;

        let err = emitter(&server, None).emit(&envelope()).await.unwrap_err();
        assert!(matches!(err, EmissionError::Rejected(ref msg) if msg == "CAF vencido"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = emitter(&server, None).emit(&envelope()).await.unwrap_err();
        assert!(matches!(err, EmissionError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_missing_artifact_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .mount(&server)
            .await;

        let err = emitter(&server, None).emit(&envelope()).await.unwrap_err();
        assert!(matches!(err, EmissionError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({ "ok": true, "artifact_url": "x" })),
            )
            .mount(&server)
            .await;

        let err = emitter(&server, None).emit(&envelope()).await.unwrap_err();
        assert!(matches!(err, EmissionError::Timeout(_)));
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = HttpEmitter::new("not a url", None, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, EmissionError::InvalidEndpoint(_)));
    }
}
