//! # Folio Module
//!
//! Document types and CAF folio pools.
//!
//! ## What is a Folio?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The tax authority (SII) authorizes each company to issue a finite     │
//! │  range of sequential numbers per document type (a CAF):                │
//! │                                                                         │
//! │    Boleta pool #1   [1 ........ 500]     next_folio = 501  (exhausted)  │
//! │    Boleta pool #2   [501 ...... 1000]    next_folio = 734               │
//! │    Factura pool #1  [1 ........ 200]     next_folio = 17                │
//! │                                                                         │
//! │  Allocation picks the lowest pool with capacity, returns next_folio    │
//! │  and increments it. A folio handed out is never handed out again,      │
//! │  even if the emission that used it fails (gaps yes, duplicates no).    │
//! │                                                                         │
//! │  Vales de venta are internal receipts: no folio, no SII code.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Document Type
// =============================================================================

/// The kind of document a sale produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Consumer receipt (tax document, SII code 39).
    Boleta,
    /// Invoice to a business receiver (tax document, SII code 33).
    Factura,
    /// Internal sales voucher. Not a tax document.
    ValeDeVenta,
}

impl DocumentType {
    /// Whether a folio must be drawn from a CAF pool.
    #[inline]
    pub const fn requires_folio(&self) -> bool {
        matches!(self, DocumentType::Boleta | DocumentType::Factura)
    }

    /// SII document type code, for tax documents only.
    pub const fn sii_code(&self) -> Option<u16> {
        match self {
            DocumentType::Boleta => Some(39),
            DocumentType::Factura => Some(33),
            DocumentType::ValeDeVenta => None,
        }
    }

    /// Whether the receiver must be named explicitly.
    ///
    /// Boletas and vales fall back to the generic consumer.
    #[inline]
    pub const fn requires_explicit_customer(&self) -> bool {
        matches!(self, DocumentType::Factura)
    }

    /// Stable lowercase slug used in logs, folder names and storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Boleta => "boleta",
            DocumentType::Factura => "factura",
            DocumentType::ValeDeVenta => "vale_de_venta",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Folio Pool
// =============================================================================

/// One authorized folio range for a company and document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct FolioPool {
    pub id: String,
    pub company_id: String,
    pub document_type: DocumentType,
    /// First folio of the authorized range.
    pub first_folio: i64,
    /// Next folio to hand out. Only ever increases.
    pub next_folio: i64,
    /// Last folio authorized by the range. Never decreases.
    pub last_folio: i64,
}

impl FolioPool {
    /// A pool is exhausted once `next_folio` has passed `last_folio`.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.next_folio > self.last_folio
    }

    /// Folios still available in this pool.
    #[inline]
    pub fn remaining(&self) -> i64 {
        (self.last_folio - self.next_folio + 1).max(0)
    }
}

/// Checks a freshly authorized range before it is stored.
///
/// `first..=last` must be non-empty, start at 1 or above, and must not
/// overlap any range already registered for the same document type.
pub fn validate_range(first: i64, last: i64, existing: &[FolioPool]) -> CoreResult<()> {
    let reject = |reason: &str| CoreError::InvalidFolioRange {
        first,
        last,
        reason: reason.to_string(),
    };

    if first < 1 {
        return Err(reject("folios start at 1"));
    }
    if last < first {
        return Err(reject("last folio is before the first"));
    }

    let overlaps = existing
        .iter()
        .any(|pool| first <= pool.last_folio && last >= pool.first_folio);
    if overlaps {
        return Err(reject("overlaps an authorized range"));
    }

    Ok(())
}
