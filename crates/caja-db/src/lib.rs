//! # caja-db: Database Layer for Caja POS
//!
//! SQLite storage for the checkout and till. Every rule that must hold
//! while several terminals share one file is enforced here, next to the
//! write it protects.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Data Flow                               │
//! │                                                                         │
//! │  CheckoutService::checkout                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ FolioRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ TillRepo       │    │ 001_initial  │  │   │
//! │  │   │ WAL + busy    │    │ OrderRepo      │    │   _schema    │  │   │
//! │  │   │ timeout       │    │ Catalog, Co.   │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   one file, shared by every terminal of the company             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//! use caja_core::DocumentType;
//!
//! let db = Database::new(DbConfig::new("caja.db")).await?;
//!
//! let folio = db.folios().allocate("c-1", DocumentType::Boleta).await?;
//! let session = db.till().require_open("b-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::{CategoryRepository, ProductRepository};
pub use repository::company::CompanyRepository;
pub use repository::customer::{CustomerInput, CustomerRepository};
pub use repository::folio::FolioRepository;
pub use repository::order::{OrderRepository, RecordedSale};
pub use repository::till::TillRepository;
