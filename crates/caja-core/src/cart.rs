//! # Cart Module
//!
//! The register's cart: lines, merge rules and IVA-inclusive totals.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action            Cart Method             Effect               │
//! │  ──────────────            ───────────             ──────               │
//! │                                                                         │
//! │  Tap product ────────────► add_line(p) ──────────► same identity: qty+1 │
//! │                                                    new identity: push   │
//! │                                                                         │
//! │  Type quantity ──────────► set_quantity(i, n) ───► qty = clamp(n,1,999) │
//! │                                                                         │
//! │  Swipe line ─────────────► remove_line(i) ───────► lines.remove(i)      │
//! │                                                                         │
//! │  Sale emitted ───────────► clear() ──────────────► lines.clear()        │
//! │                                                                         │
//! │  Totals ─────────────────► total() = Σ price × qty                      │
//! │                            net()   = round(total / 1.19)                │
//! │                            tax()   = total − net                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Identity
//! Catalog products merge by product id. Ad-hoc products typed at the
//! register are persisted as catalog entries first and carry that fresh id
//! as their identity, so typing the same name twice yields two lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, IVA};
use crate::types::{OrderItem, Product};
use crate::validation::validate_price;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Cart Product
// =============================================================================

/// What gets handed to [`Cart::add_line`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartProduct {
    /// Line identity. The catalog id for both catalog and ad-hoc products.
    pub id: String,
    pub name: String,
    pub unit_price: Money,
    pub unit_cost: Option<Money>,
    pub is_custom: bool,
}

impl CartProduct {
    /// A curated catalog product.
    pub fn catalog(id: &str, name: &str, unit_price: Money, unit_cost: Option<Money>) -> Self {
        CartProduct {
            id: id.to_string(),
            name: name.to_string(),
            unit_price,
            unit_cost,
            is_custom: false,
        }
    }

    /// A product typed at the register, already persisted under `id`.
    pub fn custom(id: &str, name: &str, unit_price: Money) -> Self {
        CartProduct {
            id: id.to_string(),
            name: name.to_string(),
            unit_price,
            unit_cost: None,
            is_custom: true,
        }
    }
}

impl From<&Product> for CartProduct {
    fn from(product: &Product) -> Self {
        CartProduct {
            id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            unit_cost: product.cost,
            is_custom: product.is_custom,
        }
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One line of the cart. Price is frozen when the line is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub identity: String,
    /// Catalog product to decrement stock on. `None` for ad-hoc lines.
    pub product_ref: Option<String>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub is_custom: bool,
    pub unit_cost: Option<Money>,
}

impl CartLine {
    fn from_product(product: CartProduct) -> Self {
        let product_ref = (!product.is_custom).then(|| product.id.clone());
        CartLine {
            identity: product.id,
            product_ref,
            name: product.name,
            unit_price: product.unit_price,
            quantity: 1,
            is_custom: product.is_custom,
            unit_cost: product.unit_cost,
        }
    }

    /// unit_price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The cart held by one terminal.
///
/// ## Invariants
/// - Lines are unique by `identity`
/// - Every quantity is within `1..=MAX_LINE_QUANTITY`
/// - At most `MAX_CART_LINES` lines
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds one unit of `product`, merging with an existing line by identity.
    pub fn add_line(&mut self, product: CartProduct) -> CoreResult<()> {
        validate_price(product.unit_price)?;

        if let Some(index) = self.lines.iter().position(|l| l.identity == product.id) {
            let quantity = self.lines[index].quantity;
            if quantity >= MAX_LINE_QUANTITY {
                return Err(quantity_out_of_range().into());
            }
            return self.try_quantity(index, quantity + 1).map(|_| ());
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(ValidationError::OutOfRange {
                field: "cart lines".to_string(),
                min: 0,
                max: MAX_CART_LINES as i64,
            }
            .into());
        }

        self.lines.push(CartLine::from_product(product));
        if self.checked_total().is_none() {
            self.lines.pop();
            return Err(total_out_of_range().into());
        }
        Ok(())
    }

    /// Sets the quantity of line `index`, clamped to `1..=MAX_LINE_QUANTITY`.
    ///
    /// Returns the quantity actually stored. Fails without touching the line
    /// if the cart total would overflow.
    pub fn set_quantity(&mut self, index: usize, quantity: i64) -> CoreResult<i64> {
        if index >= self.lines.len() {
            return Err(CoreError::LineNotFound(index));
        }
        self.try_quantity(index, quantity.clamp(1, MAX_LINE_QUANTITY))
    }

    fn try_quantity(&mut self, index: usize, quantity: i64) -> CoreResult<i64> {
        let previous = std::mem::replace(&mut self.lines[index].quantity, quantity);
        if self.checked_total().is_none() {
            self.lines[index].quantity = previous;
            return Err(total_out_of_range().into());
        }
        Ok(quantity)
    }

    /// Takes the units of `sold` out of the cart.
    ///
    /// Lines are matched by identity. Units added after `sold` was taken
    /// stay in the cart, and so do lines `sold` never had.
    pub fn remove_sold(&mut self, sold: &[CartLine]) {
        for sold_line in sold {
            if let Some(index) = self.lines.iter().position(|l| l.identity == sold_line.identity) {
                let line = &mut self.lines[index];
                if line.quantity > sold_line.quantity {
                    line.quantity -= sold_line.quantity;
                } else {
                    self.lines.remove(index);
                }
            }
        }
        if self.lines.is_empty() {
            self.created_at = Utc::now();
        }
    }

    /// Removes and returns line `index`.
    pub fn remove_line(&mut self, index: usize) -> CoreResult<CartLine> {
        if index >= self.lines.len() {
            return Err(CoreError::LineNotFound(index));
        }
        Ok(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.created_at = Utc::now();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Gross total, IVA included.
    ///
    /// `add_line` and `set_quantity` refuse any change that would make this
    /// overflow.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Gross total, or `None` if it does not fit in an i64.
    pub fn checked_total(&self) -> Option<Money> {
        self.lines.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(line.unit_price.checked_multiply_quantity(line.quantity)?)
        })
    }

    pub fn net(&self) -> Money {
        self.total().split_inclusive(IVA).0
    }

    pub fn tax(&self) -> Money {
        self.total().split_inclusive(IVA).1
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }

    /// Freezes the lines into order items for `order_id`.
    pub fn to_order_items(&self, order_id: &str) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|line| OrderItem {
                id: uuid::Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                product_id: line.product_ref.clone(),
                name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal: line.line_total(),
                unit_cost: line.unit_cost,
            })
            .collect()
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

fn total_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "cart total".to_string(),
        min: 0,
        max: i64::MAX,
    }
}

fn quantity_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "quantity".to_string(),
        min: 1,
        max: MAX_LINE_QUANTITY,
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Totals summary for the register display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub total: Money,
    pub net: Money,
    pub tax: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        let total = cart.total();
        let (net, tax) = total.split_inclusive(IVA);
        CartTotals {
            line_count: cart.line_count(),
            total_quantity: cart.total_quantity(),
            total,
            net,
            tax,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_AMOUNT;

    fn empanada() -> CartProduct {
        CartProduct::catalog("p-1", "Empanada de pino", Money::from_pesos(10_000), Some(Money::from_pesos(4_000)))
    }

    #[test]
    fn test_add_same_product_merges() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();
        cart.add_line(empanada()).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.total().pesos(), 20_000);
        assert_eq!(cart.lines()[0].product_ref.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_custom_products_stay_distinct() {
        let mut cart = Cart::new();
        cart.add_line(CartProduct::custom("adhoc-1", "Bolsa", Money::from_pesos(100))).unwrap();
        cart.add_line(CartProduct::custom("adhoc-2", "Bolsa", Money::from_pesos(100))).unwrap();

        assert_eq!(cart.line_count(), 2);
        assert!(cart.lines().iter().all(|l| l.product_ref.is_none() && l.is_custom));

        // Re-adding by the same identity merges
        cart.add_line(CartProduct::custom("adhoc-1", "Bolsa", Money::from_pesos(100))).unwrap();
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_set_quantity_clamps() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();

        assert_eq!(cart.set_quantity(0, 0).unwrap(), 1);
        assert_eq!(cart.set_quantity(0, -5).unwrap(), 1);
        assert_eq!(cart.set_quantity(0, 5_000).unwrap(), MAX_LINE_QUANTITY);
        assert_eq!(cart.set_quantity(0, 3).unwrap(), 3);
        assert!(matches!(cart.set_quantity(4, 2), Err(CoreError::LineNotFound(4))));
    }

    #[test]
    fn test_remove_line() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();
        let removed = cart.remove_line(0).unwrap();
        assert_eq!(removed.identity, "p-1");
        assert!(cart.is_empty());
        assert!(cart.remove_line(0).is_err());
    }

    #[test]
    fn test_totals_split() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();
        cart.add_line(empanada()).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.total.pesos(), 20_000);
        assert_eq!(totals.net.pesos(), 16_807);
        assert_eq!(totals.tax.pesos(), 3_193);
        assert_eq!(totals.total_quantity, 2);
    }

    #[test]
    fn test_line_limit() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_LINES {
            let id = format!("p-{}", i);
            cart.add_line(CartProduct::catalog(&id, "x", Money::from_pesos(1), None)).unwrap();
        }
        let err = cart
            .add_line(CartProduct::catalog("one-more", "x", Money::from_pesos(1), None))
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_quantity_limit_on_merge() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();
        cart.set_quantity(0, MAX_LINE_QUANTITY).unwrap();
        assert!(cart.add_line(empanada()).is_err());
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut cart = Cart::new();
        let err = cart
            .add_line(CartProduct::catalog("p-x", "x", Money::from_pesos(-1), None))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_oversized_price_rejected() {
        let mut cart = Cart::new();
        let huge = CartProduct::custom("adhoc-1", "x", Money::from_pesos(i64::MAX / 2));
        assert!(matches!(cart.add_line(huge), Err(CoreError::Validation(_))));
        assert!(cart.is_empty());

        // The largest allowed price at the largest quantity still fits
        cart.add_line(CartProduct::custom("adhoc-2", "x", Money::from_pesos(MAX_AMOUNT))).unwrap();
        cart.set_quantity(0, MAX_LINE_QUANTITY).unwrap();
        assert_eq!(cart.total().pesos(), MAX_AMOUNT * MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_overflowing_quantity_leaves_line_untouched() {
        // A cart restored from JSON skips add_line validation
        let json = format!(
            r#"{{"lines":[{{"identity":"p-1","productRef":"p-1","name":"x","unitPrice":{},"quantity":1,"isCustom":false,"unitCost":null}}],"createdAt":"2026-01-01T00:00:00Z"}}"#,
            i64::MAX / 2
        );
        let mut cart: Cart = serde_json::from_str(&json).unwrap();

        let err = cart.set_quantity(0, 3).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(cart.lines()[0].quantity, 1);

        cart.set_quantity(0, 2).unwrap();
        let err = cart.add_line(CartProduct::catalog("p-1", "x", Money::from_pesos(1), None)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.checked_total(), Some(Money::from_pesos(i64::MAX - 1)));
    }

    #[test]
    fn test_remove_sold_keeps_later_additions() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();
        cart.add_line(CartProduct::custom("adhoc-1", "Bolsa", Money::from_pesos(100))).unwrap();
        let sold = cart.lines().to_vec();

        // Added while the sale was being emitted
        cart.add_line(empanada()).unwrap();
        cart.add_line(CartProduct::catalog("p-2", "Bebida", Money::from_pesos(1_500), None)).unwrap();

        cart.remove_sold(&sold);
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.lines()[0].identity, "p-1");
        assert_eq!(cart.lines()[0].quantity, 1);
        assert_eq!(cart.lines()[1].identity, "p-2");

        // Removed meanwhile: nothing to take out
        cart.remove_sold(&sold);
        assert_eq!(cart.lines()[0].identity, "p-2");
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_to_order_items_freezes_lines() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();
        cart.add_line(empanada()).unwrap();
        cart.add_line(CartProduct::custom("adhoc-1", "Bolsa", Money::from_pesos(100))).unwrap();

        let items = cart.to_order_items("o-1");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].subtotal.pesos(), 20_000);
        assert_eq!(items[0].unit_cost, Some(Money::from_pesos(4_000)));
        assert_eq!(items[1].product_id, None);
        assert!(items.iter().all(|i| i.order_id == "o-1"));
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add_line(empanada()).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.total().is_zero());
    }
}
