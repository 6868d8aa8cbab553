//! # Document Envelope
//!
//! The JSON body posted to the emission service.
//!
//! ```text
//! {
//!   "document_type": "boleta",
//!   "sii_code": 39,                ← tax documents only
//!   "folio": 137,                  ← tax documents only
//!   "credential_ref": "cert-demo", ← tax documents only
//!   "issuer":   { "rut": "76086428-5", "business_name": ..., "giro": ... },
//!   "receiver": { "tax_id": "66666666-6", "name": "Consumidor Final", ... },
//!   "items":    [ { "name": ..., "quantity": 2, "unit_price": 10000, "line_total": 20000 } ],
//!   "totals":   { "net": 16807, "tax": 3193, "total": 20000 },
//!   "payment_method": "cash",
//!   "issued_on": "2024-05-02"
//! }
//! ```

use caja_core::{Cart, Company, DocumentType, Money, PaymentMethod, Receiver};
use chrono::NaiveDate;
use serde::Serialize;
use ts_rs::TS;

/// Issuer block (emisor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Issuer {
    pub rut: String,
    pub business_name: String,
    pub giro: String,
    pub address: String,
    pub commune: String,
}

impl From<&Company> for Issuer {
    fn from(company: &Company) -> Self {
        Issuer {
            rut: company.tax_id.to_string(),
            business_name: company.business_name.clone(),
            giro: company.giro.clone(),
            address: company.address.clone(),
            commune: company.commune.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct EnvelopeItem {
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct EnvelopeTotals {
    pub net: Money,
    pub tax: Money,
    pub total: Money,
}

/// One document to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct DocumentEnvelope {
    pub document_type: DocumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sii_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folio: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
    pub issuer: Issuer,
    pub receiver: Receiver,
    pub items: Vec<EnvelopeItem>,
    pub totals: EnvelopeTotals,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub issued_on: NaiveDate,
}

impl DocumentEnvelope {
    /// Builds the envelope for a cart.
    ///
    /// `folio` is ignored for documents that carry none, so a vale never
    /// leaks tax-document fields.
    pub fn build(
        document_type: DocumentType,
        folio: Option<i64>,
        issuer: &Company,
        receiver: Receiver,
        cart: &Cart,
        payment_method: PaymentMethod,
        issued_on: NaiveDate,
    ) -> Self {
        let is_tax_document = document_type.requires_folio();

        let items = cart
            .lines()
            .iter()
            .map(|line| EnvelopeItem {
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total(),
            })
            .collect();

        DocumentEnvelope {
            document_type,
            sii_code: document_type.sii_code(),
            folio: folio.filter(|_| is_tax_document),
            credential_ref: issuer.credential_ref.clone().filter(|_| is_tax_document),
            issuer: Issuer::from(issuer),
            receiver,
            items,
            totals: EnvelopeTotals {
                net: cart.net(),
                tax: cart.tax(),
                total: cart.total(),
            },
            payment_method,
            issued_on,
        }
    }
}
