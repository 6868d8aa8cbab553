//! # Plan Module
//!
//! Subscription plans, the branch ceiling and plan-change proration.
//!
//! ## Proration Rules (first match wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  t = target price for the target period, c = current price             │
//! │                                                                         │
//! │  1. days_remaining ≤ 0                       → t                        │
//! │  2. t ≤ c                                    → 0   (downgrade)          │
//! │  3. same period                              → round((t−c)/len × days)  │
//! │                                                 len = 30 or 365         │
//! │  4. monthly → yearly, same tier group        → t   (full yearly)        │
//! │  5. yearly → monthly, same tier group        → 0                        │
//! │  6. anything else                            → t                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use caja_core::plan::{prorated_charge, BillingPeriod, PlanSelection, SubscriptionPlan};
//! use caja_core::Money;
//!
//! let plan = |id: &str, monthly: i64| SubscriptionPlan {
//!     id: id.to_string(),
//!     name: id.to_string(),
//!     tier_group: "pyme".to_string(),
//!     monthly_price: Money::from_pesos(monthly),
//!     yearly_price: Money::from_pesos(monthly * 10),
//!     max_branches: Some(1),
//! };
//!
//! let current = PlanSelection::new(plan("basic", 15_990), BillingPeriod::Monthly);
//! let charge = prorated_charge(&current, &plan("pro", 20_990), 15, false);
//! assert_eq!(charge.pesos(), 2_500);
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{round_div, Money};

// =============================================================================
// Billing Period
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    #[default]
    Monthly,
    Yearly,
}

impl BillingPeriod {
    /// Days used to prorate within one period.
    pub const fn length_days(&self) -> i64 {
        match self {
            BillingPeriod::Monthly => 30,
            BillingPeriod::Yearly => 365,
        }
    }

    pub const fn from_yearly(is_yearly: bool) -> Self {
        if is_yearly {
            BillingPeriod::Yearly
        } else {
            BillingPeriod::Monthly
        }
    }
}

// =============================================================================
// Subscription Plan
// =============================================================================

/// A plan a company can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    /// Plans in the same group differ only by billing period or tier.
    pub tier_group: String,
    pub monthly_price: Money,
    pub yearly_price: Money,
    /// `None` means unlimited branches.
    pub max_branches: Option<i64>,
}

impl SubscriptionPlan {
    pub fn price_for(&self, period: BillingPeriod) -> Money {
        match period {
            BillingPeriod::Monthly => self.monthly_price,
            BillingPeriod::Yearly => self.yearly_price,
        }
    }

    /// Whether one more branch fits under this plan.
    pub fn allows_another_branch(&self, current_branches: i64) -> bool {
        can_create_branch(self.max_branches, current_branches)
    }
}

/// A plan bound to a company together with how it is billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlanSelection {
    pub plan: SubscriptionPlan,
    pub period: BillingPeriod,
}

impl PlanSelection {
    pub fn new(plan: SubscriptionPlan, period: BillingPeriod) -> Self {
        PlanSelection { plan, period }
    }

    pub fn price(&self) -> Money {
        self.plan.price_for(self.period)
    }
}

// =============================================================================
// Governor Rules
// =============================================================================

/// Branch gate: unbounded plans always pass, otherwise `count < max`.
#[inline]
pub fn can_create_branch(max_branches: Option<i64>, current_branches: i64) -> bool {
    match max_branches {
        None => true,
        Some(max) => current_branches < max,
    }
}

/// Charge for switching plans mid-period.
pub fn prorated_charge(
    current: &PlanSelection,
    target: &SubscriptionPlan,
    days_remaining: i64,
    is_yearly_target: bool,
) -> Money {
    let target_period = BillingPeriod::from_yearly(is_yearly_target);
    let target_price = target.price_for(target_period);
    let current_price = current.price();

    if days_remaining <= 0 {
        return target_price;
    }

    if target_price <= current_price {
        return Money::zero();
    }

    if current.period == target_period {
        let diff = (target_price - current_price).pesos() as i128;
        let charge = round_div(
            diff * days_remaining as i128,
            target_period.length_days() as i128,
        );
        return Money::from_pesos(charge as i64).floor_zero();
    }

    let same_tier = current.plan.tier_group == target.tier_group;
    match (current.period, target_period) {
        (BillingPeriod::Monthly, BillingPeriod::Yearly) if same_tier => target_price,
        (BillingPeriod::Yearly, BillingPeriod::Monthly) if same_tier => Money::zero(),
        _ => target_price,
    }
}
