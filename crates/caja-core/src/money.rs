//! # Money Module
//!
//! Provides the `Money` type for Chilean pesos and the VAT-inclusive split.
//!
//! ## Why Integer Pesos?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CLP HAS NO MINOR UNIT                                                  │
//! │                                                                         │
//! │  Every price, float and count in the till is a whole number of pesos.  │
//! │  Money wraps an i64 and never touches floating point.                  │
//! │                                                                         │
//! │  PRICES ALREADY INCLUDE IVA (19%)                                       │
//! │    total = Σ unit_price × qty                                           │
//! │    net   = round(total / 1.19)                                          │
//! │    tax   = total − net            ← never computed independently       │
//! │                                                                         │
//! │  Deriving tax by subtraction guarantees net + tax == total exactly.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::money::{Money, IVA};
//!
//! let total = Money::from_pesos(20_000);
//! let (net, tax) = total.split_inclusive(IVA);
//! assert_eq!(net.pesos(), 16_807);
//! assert_eq!(tax.pesos(), 3_193);
//! assert_eq!(format!("{}", total), "$20.000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so Chilean IVA (19%) is 1900 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Chilean value-added tax, baked into every catalog price.
pub const IVA: TaxRate = TaxRate::from_bps(1900);

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole Chilean pesos.
///
/// ## Design Decisions
/// - **i64 (signed)**: Till differences can be negative (short)
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Transparent serde**: serializes as a plain integer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole pesos.
    #[inline]
    pub const fn from_pesos(pesos: i64) -> Self {
        Money(pesos)
    }

    /// Returns the value in pesos.
    #[inline]
    pub const fn pesos(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// let unit_price = Money::from_pesos(1_990);
    /// assert_eq!(unit_price.multiply_quantity(3).pesos(), 5_970);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `self × qty`, or `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// `self + other`, or `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert!(Money::from_pesos(i64::MAX).checked_add(Money::from_pesos(1)).is_none());
    /// assert_eq!(Money::from_pesos(1).checked_add(Money::from_pesos(2)), Some(Money::from_pesos(3)));
    /// ```
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Splits a tax-inclusive amount into `(net, tax)`.
    ///
    /// `net` is `amount / (1 + rate)` rounded half away from zero, and
    /// `tax` is the remainder, so `net + tax == self` for every input.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::{Money, IVA};
    ///
    /// let (net, tax) = Money::from_pesos(1_190).split_inclusive(IVA);
    /// assert_eq!((net.pesos(), tax.pesos()), (1_000, 190));
    /// ```
    pub fn split_inclusive(&self, rate: TaxRate) -> (Money, Money) {
        // i128 keeps `amount * 10000` from overflowing on large totals
        let net = round_div(self.0 as i128 * 10_000, 10_000 + rate.bps() as i128);
        let net = Money(net as i64);
        (net, *self - net)
    }

    /// Returns the larger of `self` and zero.
    #[inline]
    pub fn floor_zero(self) -> Money {
        Money(self.0.max(0))
    }
}

/// Integer division rounding half away from zero.
pub(crate) fn round_div(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Chilean formatting: `$` prefix and `.` thousands separator.
///
/// Receipts and the till summary use this exact format.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}", sign, grouped)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
