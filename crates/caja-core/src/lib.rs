//! # caja-core: Pure Business Logic for Caja POS
//!
//! This crate holds the checkout and cash-register rules as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  caja-pos (orchestration)                       │   │
//! │  │   CheckoutService, TillService, PlanGovernor, HTTP clients      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │  cart   │ │  folio  │ │  till   │ │  plan   │  │   │
//! │  │   │ Money   │ │ Cart    │ │ Pool    │ │ Session │ │ Prorate │  │   │
//! │  │   │ IVA 19% │ │ Line    │ │ DocType │ │ Close   │ │ Gate    │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caja-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer CLP money and the VAT-inclusive split
//! - [`cart`] - Cart lines, merge rules and totals
//! - [`folio`] - Document types and CAF folio pools
//! - [`till`] - Cash sessions, movements, balance and close report
//! - [`plan`] - Subscription plans, branch ceiling and proration
//! - [`types`] - Directory records (company, customer, product, order)
//! - [`validation`] - Input rules, including RUT check digits
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::cart::{Cart, CartProduct};
//! use caja_core::money::Money;
//!
//! let mut cart = Cart::new();
//! cart.add_line(CartProduct::catalog("p-1", "Empanada", Money::from_pesos(10_000), None))
//!     .unwrap();
//! cart.add_line(CartProduct::catalog("p-1", "Empanada", Money::from_pesos(10_000), None))
//!     .unwrap();
//!
//! assert_eq!(cart.total().pesos(), 20_000);
//! assert_eq!(cart.net().pesos() + cart.tax().pesos(), 20_000);
//! ```

pub mod cart;
pub mod error;
pub mod folio;
pub mod money;
pub mod plan;
pub mod till;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartLine, CartProduct, CartTotals};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use folio::{DocumentType, FolioPool};
pub use money::{Money, TaxRate, IVA};
pub use plan::{BillingPeriod, PlanSelection, SubscriptionPlan};
pub use till::{CashMovement, CashSession, CloseReport, CloseStatus, MovementKind, TillSummary};
pub use types::*;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typing 1000 instead of 10 at the register.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Ceiling for a unit price or a single cash amount (one trillion pesos).
///
/// `MAX_AMOUNT × MAX_LINE_QUANTITY × MAX_CART_LINES` still fits in an i64.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Name of the catalog category ad-hoc products are filed under.
pub const DEFAULT_CATEGORY_NAME: &str = "General";
