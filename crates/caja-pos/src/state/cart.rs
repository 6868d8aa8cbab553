//! # Cart State
//!
//! The cart of one terminal, shared by every service that touches it.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_line ──► set_quantity ──► remove_line ──► checkout                 │
//! │      ▲                                            │                     │
//! │      │                                            ├── Ok  ──► clear sold│
//! │      │                                            │                     │
//! │      └────────────────────────────────────────────┴── Err ──► unchanged │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkout takes a snapshot of the cart, works on the snapshot, and only
//! takes the snapshotted units out of the shared cart after the sale is
//! written. A failed checkout leaves the lines exactly as they were.

use caja_core::{Cart, CartLine, CartProduct, CartTotals, CoreResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Terminal-managed cart state.
///
/// ## Thread Safety
/// `Arc<Mutex<Cart>>`: cart operations are short and nearly all of them
/// write. The lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
}

impl CartState {
    /// Creates a new empty cart state.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        // Cart methods validate before mutating, so a poisoned cart is intact.
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Executes a function with read access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let totals = cart_state.with_cart(|cart| cart.totals());
    /// ```
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.lock();
        f(&cart)
    }

    /// Executes a function with write access to the cart.
    pub fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.lock();
        f(&mut cart)
    }

    // =========================================================================
    // Shortcuts used by the terminal UI
    // =========================================================================

    pub fn add_line(&self, product: CartProduct) -> CoreResult<CartTotals> {
        self.with_cart_mut(|cart| {
            cart.add_line(product)?;
            Ok(cart.totals())
        })
    }

    /// Returns the quantity actually stored after clamping.
    pub fn set_quantity(&self, index: usize, quantity: i64) -> CoreResult<i64> {
        self.with_cart_mut(|cart| cart.set_quantity(index, quantity))
    }

    pub fn remove_line(&self, index: usize) -> CoreResult<CartTotals> {
        self.with_cart_mut(|cart| {
            cart.remove_line(index)?;
            Ok(cart.totals())
        })
    }

    pub fn clear(&self) {
        self.with_cart_mut(Cart::clear);
    }

    /// Takes the units of a completed sale out of the cart.
    pub fn remove_sold(&self, sold: &[CartLine]) {
        self.with_cart_mut(|cart| cart.remove_sold(sold));
    }

    pub fn totals(&self) -> CartTotals {
        self.with_cart(Cart::totals)
    }

    /// A copy of the cart as it is right now.
    pub fn snapshot(&self) -> Cart {
        self.with_cart(Cart::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caja_core::Money;

    fn pan() -> CartProduct {
        CartProduct::catalog("p-pan", "Marraqueta", Money::from_pesos(250), None)
    }

    #[test]
    fn test_shared_between_clones() {
        let state = CartState::new();
        let other = state.clone();

        state.add_line(pan()).unwrap();
        other.add_line(pan()).unwrap();

        let totals = state.totals();
        assert_eq!(totals.line_count, 1);
        assert_eq!(totals.total_quantity, 2);
        assert_eq!(totals.total.pesos(), 500);
    }

    #[test]
    fn test_failed_edit_leaves_cart_untouched() {
        let state = CartState::new();
        state.add_line(pan()).unwrap();

        assert!(state.remove_line(3).is_err());
        assert!(state
            .add_line(CartProduct::catalog("p-x", "Error", Money::from_pesos(-10), None))
            .is_err());
        assert_eq!(state.totals().line_count, 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let state = CartState::new();
        state.add_line(pan()).unwrap();

        let snapshot = state.snapshot();
        state.clear();

        assert!(state.with_cart(Cart::is_empty));
        assert_eq!(snapshot.line_count(), 1);
    }

    #[test]
    fn test_set_quantity_clamps() {
        let state = CartState::new();
        state.add_line(pan()).unwrap();

        assert_eq!(state.set_quantity(0, 0).unwrap(), 1);
        assert_eq!(state.set_quantity(0, 12).unwrap(), 12);
        assert_eq!(state.totals().total.pesos(), 3_000);
    }
}
