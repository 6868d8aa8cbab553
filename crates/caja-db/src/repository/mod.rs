//! # Repository Module
//!
//! Database repository implementations for Caja POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  caja-pos service                                                       │
//! │       │                                                                 │
//! │       │  db.folios().allocate(&company_id, DocumentType::Boleta)        │
//! │       ▼                                                                 │
//! │  FolioRepository                                                        │
//! │  ├── allocate(&self, company, type)   ← one UPDATE … RETURNING          │
//! │  ├── remaining(&self, company, type)                                    │
//! │  └── register_pool(&self, company, type, first, last)                   │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! │                                                                         │
//! │  Every check that must hold under concurrency is part of the same      │
//! │  statement (or transaction) as the write it guards.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`FolioRepository`](folio::FolioRepository) - CAF pools and allocation
//! - [`TillRepository`](till::TillRepository) - Cash sessions and movements
//! - [`OrderRepository`](order::OrderRepository) - Orders, items and sale ingress
//! - [`ProductRepository`](catalog::ProductRepository) - Catalog and stock
//! - [`CategoryRepository`](catalog::CategoryRepository) - Catalog categories
//! - [`CompanyRepository`](company::CompanyRepository) - Companies, branches, plans
//! - [`CustomerRepository`](customer::CustomerRepository) - Document receivers

pub mod catalog;
pub mod company;
pub mod customer;
pub mod folio;
pub mod order;
pub mod till;
