//! # Domain Types
//!
//! Directory records and sales documents used throughout Caja POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Company      │   │     Branch      │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  tax_id (RUT)   │──►│  company_id     │   │  tax_id?        │       │
//! │  │  business_name  │   │  name, address  │   │  name, giro     │       │
//! │  │  credential_ref │   └─────────────────┘   └─────────────────┘       │
//! │  │  plan binding   │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │   OrderItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price (IVA in) │   │  document_type  │◄──│  order_id       │       │
//! │  │  cost?, stock?  │   │  folio?         │   │  name snapshot  │       │
//! │  │  is_custom      │   │  amount/net/tax │   │  unit_price     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Normalize Once
//! Rows coming out of the directory store are converted into these types at
//! the repository boundary. A customer whose stored RUT fails the check
//! digit gets `tax_id: None`, so the emission path only ever asks one
//! question: "is there a `TaxId`?".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::folio::DocumentType;
use crate::money::Money;
use crate::plan::BillingPeriod;
use crate::validation::parse_rut;

// =============================================================================
// Tax Identity (RUT)
// =============================================================================

/// A validated Chilean RUT: numeric body plus módulo 11 check digit.
///
/// Displays in the canonical `12345678-5` form the emission service expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxId {
    body: u32,
    check_digit: char,
}

/// RUT the SII reserves for anonymous final consumers.
pub const GENERIC_CONSUMER_RUT: &str = "66666666-6";

/// Receiver name used on boletas without a named customer.
pub const GENERIC_CONSUMER_NAME: &str = "Consumidor Final";

impl TaxId {
    /// Parses and validates a RUT in any common spelling.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (body, check_digit) = parse_rut(raw)?;
        Ok(TaxId { body, check_digit })
    }

    /// The anonymous final consumer, 66.666.666-6.
    pub const fn generic_consumer() -> Self {
        TaxId {
            body: 66_666_666,
            check_digit: '6',
        }
    }

    pub fn body(&self) -> u32 {
        self.body
    }

    pub fn check_digit(&self) -> char {
        self.check_digit
    }

    /// Dotted form for receipts, e.g. `76.086.428-5`.
    pub fn dotted(&self) -> String {
        let digits = self.body.to_string();
        let mut out = String::with_capacity(digits.len() + 4);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push('.');
            }
            out.push(ch);
        }
        out.push('-');
        out.push(self.check_digit);
        out
    }
}

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.body, self.check_digit)
    }
}

impl FromStr for TaxId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaxId::parse(s)
    }
}

impl TryFrom<String> for TaxId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaxId::parse(&value)
    }
}

impl From<TaxId> for String {
    fn from(value: TaxId) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Company & Branch
// =============================================================================

/// The issuing company (emisor).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Company {
    pub id: String,
    #[ts(as = "String")]
    pub tax_id: TaxId,
    pub business_name: String,
    /// Line of business printed on tax documents.
    pub giro: String,
    pub address: String,
    pub commune: String,
    /// Reference to the signing certificate held by the emission service.
    pub credential_ref: Option<String>,
    /// Subscription plan binding, if any.
    pub plan_id: Option<String>,
    pub billing_period: BillingPeriod,
}

/// A physical location of a company. Each branch has its own till.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// A document receiver (receptor).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub company_id: String,
    /// `None` when the stored RUT is missing or fails the check digit.
    #[ts(as = "Option<String>")]
    pub tax_id: Option<TaxId>,
    pub name: String,
    pub giro: Option<String>,
    pub address: Option<String>,
    pub commune: Option<String>,
}

impl Customer {
    /// Returns the RUT, or `INCOMPLETE_CUSTOMER` if there is none.
    pub fn require_tax_id(&self) -> CoreResult<TaxId> {
        self.tax_id
            .ok_or_else(|| CoreError::IncompleteCustomer(format!("{} has no valid RUT", self.name)))
    }
}

/// Who a document is addressed to, after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receiver {
    #[ts(as = "String")]
    pub tax_id: TaxId,
    pub name: String,
    pub giro: Option<String>,
    pub address: Option<String>,
    pub commune: Option<String>,
}

impl Receiver {
    /// Anonymous final consumer used by boletas and vales.
    pub fn generic_consumer() -> Self {
        Receiver {
            tax_id: TaxId::generic_consumer(),
            name: GENERIC_CONSUMER_NAME.to_string(),
            giro: None,
            address: None,
            commune: None,
        }
    }

    /// Resolves the receiver for a document.
    ///
    /// ## Rules
    /// ```text
    /// customer given       → its RUT must be complete, else INCOMPLETE_CUSTOMER
    /// no customer, factura → INCOMPLETE_CUSTOMER
    /// no customer, other   → generic consumer 66.666.666-6
    /// ```
    pub fn resolve(document_type: DocumentType, customer: Option<&Customer>) -> CoreResult<Self> {
        match customer {
            Some(customer) => Ok(Receiver {
                tax_id: customer.require_tax_id()?,
                name: customer.name.clone(),
                giro: customer.giro.clone(),
                address: customer.address.clone(),
                commune: customer.commune.clone(),
            }),
            None if document_type.requires_explicit_customer() => Err(
                CoreError::IncompleteCustomer(format!("a {} needs a customer", document_type)),
            ),
            None => Ok(Receiver::generic_consumer()),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog category.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub company_id: String,
    pub name: String,
}

/// A catalog product. Prices include IVA.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub company_id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub price: Money,
    pub cost: Option<Money>,
    /// Units on hand; `None` when stock is not tracked.
    pub stock: Option<i64>,
    /// Created on the fly from the register rather than curated.
    pub is_custom: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Efectivo.
    Cash,
    /// Tarjeta de débito.
    Debit,
    /// Tarjeta de crédito.
    Credit,
    /// Transferencia bancaria.
    Transfer,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A completed sale. Written once after successful emission, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub document_type: DocumentType,
    /// `None` for vales de venta.
    pub folio: Option<i64>,
    /// Gross total, IVA included.
    pub amount: Money,
    pub net: Money,
    pub tax: Money,
    /// Total units across all lines.
    pub quantity: i64,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub document_artifact_url: String,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A line of an order. Name and prices are frozen at the time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// `None` for ad-hoc lines.
    pub product_id: Option<String>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    /// unit_price × quantity.
    pub subtotal: Money,
    pub unit_cost: Option<Money>,
}

// =============================================================================
// Unit Tests
// =============================================================================
