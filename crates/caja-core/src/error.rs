//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule failures (till closed, ...)      │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Taxonomy every error is classified into        │
//! │                                                                         │
//! │  caja-db errors                                                         │
//! │  └── DbError          - Database failures (wraps CoreError)            │
//! │                                                                         │
//! │  caja-pos errors                                                        │
//! │  └── ApiError         - What the UI sees (code + kind + message)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → UI            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Kinds
//! ```text
//! VALIDATION           bad amount, empty reason, incomplete customer
//! RESOURCE_EXHAUSTED   folio pool empty
//! PRECONDITION_FAILED  till closed, session already open / closed,
//!                      no signing credential
//! EXTERNAL_FAILURE     emission non-ok, store or network fault
//! RACE_LOST            lost an atomic race, retry as a fresh operation
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::folio::DocumentType;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of every failure the POS can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Input rejected; nothing was mutated.
    Validation,
    /// A finite resource (folio range) is used up.
    ResourceExhausted,
    /// The operation is not allowed in the current state.
    PreconditionFailed,
    /// A collaborator (store, emission service, network) failed.
    ExternalFailure,
    /// An atomic race was lost; retry as a new operation.
    RaceLost,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Each variant maps to one [`ErrorKind`] and one stable code string the UI
/// can switch on.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Monetary input is out of range (negative float, zero movement, ...).
    #[error("Invalid amount for {field}: {reason}")]
    InvalidAmount { field: String, reason: String },

    /// Movement reason is missing or too long.
    #[error("Invalid reason: {0}")]
    InvalidReason(String),

    /// Sale cannot proceed: empty cart or no payment method.
    #[error("Invalid sale: {0}")]
    InvalidSale(String),

    /// Customer lacks a complete RUT (body + valid check digit).
    #[error("Customer tax identity incomplete: {0}")]
    IncompleteCustomer(String),

    /// No folio pool with remaining capacity.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (Boleta)
    ///      │
    ///      ▼
    /// allocate(company, Boleta) → next_folio > last_folio
    ///      │
    ///      ▼
    /// FolioExhausted → UI: "Sin folios disponibles, cargue un nuevo CAF"
    /// ```
    #[error("No folios left for {document_type} (company {company_id})")]
    FolioExhausted {
        company_id: String,
        document_type: DocumentType,
    },

    /// A new CAF range is malformed or overlaps an existing one.
    #[error("Invalid folio range {first}..={last}: {reason}")]
    InvalidFolioRange { first: i64, last: i64, reason: String },

    /// No open cash session for the branch.
    #[error("Till is closed for branch {branch_id}")]
    TillClosed { branch_id: String },

    /// Branch already has an open cash session.
    #[error("Till already open for branch {branch_id}")]
    TillAlreadyOpen { branch_id: String },

    /// Session was closed (possibly concurrently) before the write.
    #[error("Cash session {session_id} is closed")]
    SessionClosed { session_id: String },

    /// Boleta/factura requested but the company has no signing credential.
    #[error("Company {company_id} has no signing credential for tax documents")]
    MissingCredential { company_id: String },

    /// Company reached its plan's branch ceiling.
    #[error("Plan allows at most {max} branches")]
    BranchLimitReached { max: i64 },

    /// Auth session is past its expiry.
    #[error("Session expired, sign in again")]
    SessionExpired,

    /// Cart line index out of range.
    #[error("Cart has no line at index {0}")]
    LineNotFound(usize),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidAmount { .. }
            | CoreError::InvalidReason(_)
            | CoreError::InvalidSale(_)
            | CoreError::IncompleteCustomer(_)
            | CoreError::InvalidFolioRange { .. }
            | CoreError::LineNotFound(_)
            | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::FolioExhausted { .. } => ErrorKind::ResourceExhausted,
            CoreError::TillClosed { .. }
            | CoreError::TillAlreadyOpen { .. }
            | CoreError::SessionClosed { .. }
            | CoreError::MissingCredential { .. }
            | CoreError::BranchLimitReached { .. }
            | CoreError::SessionExpired => ErrorKind::PreconditionFailed,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidAmount { .. } => "INVALID_AMOUNT",
            CoreError::InvalidReason(_) => "INVALID_REASON",
            CoreError::InvalidSale(_) => "INVALID_SALE",
            CoreError::IncompleteCustomer(_) => "INCOMPLETE_CUSTOMER",
            CoreError::FolioExhausted { .. } => "EXHAUSTED",
            CoreError::InvalidFolioRange { .. } => "INVALID_FOLIO_RANGE",
            CoreError::TillClosed { .. } => "TILL_CLOSED",
            CoreError::TillAlreadyOpen { .. } => "ALREADY_OPEN",
            CoreError::SessionClosed { .. } => "SESSION_CLOSED",
            CoreError::MissingCredential { .. } => "MISSING_CREDENTIAL",
            CoreError::BranchLimitReached { .. } => "BRANCH_LIMIT_REACHED",
            CoreError::SessionExpired => "SESSION_EXPIRED",
            CoreError::LineNotFound(_) => "LINE_NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    pub(crate) fn invalid_amount(field: &str, reason: &str) -> Self {
        CoreError::InvalidAmount {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed RUT, invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
