//! # Services Module
//!
//! The operations a terminal UI invokes. Each service owns clones of the
//! shared handles it needs and returns `ApiResult`.
//!
//! ## Service Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Service Categories                              │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │ CheckoutService │  │  TillService    │  │  CatalogService         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ • checkout      │  │ • open          │  │ • search / add_to_cart  │ │
//! │  │ • folio status  │  │ • record        │  │ • add_custom_product    │ │
//! │  │                 │  │ • close         │  │ • upload_image          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │  PlanGovernor   │                                                    │
//! │  │ • can/create    │                                                    │
//! │  │   branch        │                                                    │
//! │  │ • quote change  │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod checkout;
pub mod governor;
pub mod till;

pub use catalog::CatalogService;
pub use checkout::{CheckoutRequest, CheckoutService, FolioStatus, Receipt};
pub use governor::PlanGovernor;
pub use till::TillService;
