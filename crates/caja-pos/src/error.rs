//! # API Error Type
//!
//! Unified error returned by every service in this crate.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Caja POS                               │
//! │                                                                         │
//! │  ValidationError ─► CoreError ─┐                                        │
//! │                                 ├─► DbError ─┐                          │
//! │                                 │            │                          │
//! │  EmissionError ─────────────────┼────────────┼─► ApiError               │
//! │  ConfigError ───────────────────┘            │   { code, kind, message }│
//! │                                              │                          │
//! │  Terminal UI                                 ▼                          │
//! │  switch (e.kind) {                                                      │
//! │    case 'VALIDATION':          highlight the field                      │
//! │    case 'PRECONDITION_FAILED': e.g. "Abra la caja primero"              │
//! │    case 'RESOURCE_EXHAUSTED':  "Sin folios, cargue un nuevo CAF"        │
//! │    case 'RACE_LOST':           offer to try again                       │
//! │    case 'EXTERNAL_FAILURE':    show message, cart is intact             │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::{CoreError, ErrorKind};
use caja_db::DbError;
use serde::Serialize;
use ts_rs::TS;

use crate::config::ConfigError;
use crate::emission::EmissionError;

/// Error returned by services.
///
/// ## Serialization
/// ```json
/// {
///   "code": "TILL_CLOSED",
///   "kind": "PRECONDITION_FAILED",
///   "message": "Till is closed for branch b-1"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Coarse class, enough to decide how to react
    pub kind: ErrorKind,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidAmount,
    InvalidReason,
    InvalidSale,
    IncompleteCustomer,
    /// No folio left in any pool.
    Exhausted,
    InvalidFolioRange,
    TillClosed,
    AlreadyOpen,
    SessionClosed,
    MissingCredential,
    BranchLimitReached,
    SessionExpired,
    LineNotFound,
    EmissionFailed,
    UploadFailed,
    NotFound,
    ValidationError,
    /// SQLite write lock not obtained in time.
    DatabaseBusy,
    DatabaseError,
    ConfigError,
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            code,
            kind,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            ErrorKind::Validation,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, ErrorKind::Validation, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, ErrorKind::ExternalFailure, message)
    }

    /// Wraps an upload failure.
    pub fn upload(err: EmissionError) -> Self {
        ApiError::new(
            ErrorCode::UploadFailed,
            ErrorKind::ExternalFailure,
            format!("Upload failed: {}", err),
        )
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
            CoreError::InvalidReason(_) => ErrorCode::InvalidReason,
            CoreError::InvalidSale(_) => ErrorCode::InvalidSale,
            CoreError::IncompleteCustomer(_) => ErrorCode::IncompleteCustomer,
            CoreError::FolioExhausted { .. } => ErrorCode::Exhausted,
            CoreError::InvalidFolioRange { .. } => ErrorCode::InvalidFolioRange,
            CoreError::TillClosed { .. } => ErrorCode::TillClosed,
            CoreError::TillAlreadyOpen { .. } => ErrorCode::AlreadyOpen,
            CoreError::SessionClosed { .. } => ErrorCode::SessionClosed,
            CoreError::MissingCredential { .. } => ErrorCode::MissingCredential,
            CoreError::BranchLimitReached { .. } => ErrorCode::BranchLimitReached,
            CoreError::SessionExpired => ErrorCode::SessionExpired,
            CoreError::LineNotFound(_) => ErrorCode::LineNotFound,
            CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, err.kind(), err.to_string())
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let kind = err.kind();
        match err {
            DbError::Domain(core) => ApiError::from(core),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                kind,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, kind, "Invalid reference")
            }
            DbError::Busy(e) => {
                tracing::warn!("Database busy: {}", e);
                ApiError::new(
                    ErrorCode::DatabaseBusy,
                    kind,
                    "Another terminal is writing, try again",
                )
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, kind, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, kind, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, kind, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, kind, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, kind, "Database operation failed")
            }
        }
    }
}

/// Emission failures surface as `EMISSION_FAILED`.
impl From<EmissionError> for ApiError {
    fn from(err: EmissionError) -> Self {
        ApiError::new(
            ErrorCode::EmissionFailed,
            ErrorKind::ExternalFailure,
            format!("Document emission failed: {}", err),
        )
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, ErrorKind::Validation, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;
