//! Property-based tests for the arithmetic the register depends on.
//!
//! Cart totals, the IVA split, till balances and proration are checked
//! across wide input ranges.

use caja_core::plan::{prorated_charge, BillingPeriod, PlanSelection, SubscriptionPlan};
use caja_core::till::{balance, CashMovement, CloseReport, MovementKind, TillSummary};
use caja_core::validation::{parse_rut, rut_check_digit};
use caja_core::{Cart, CartProduct, Money, IVA, MAX_LINE_QUANTITY};
use proptest::prelude::*;

fn price_strategy() -> impl Strategy<Value = i64> {
    0i64..2_000_000
}

fn lines_strategy() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((price_strategy(), 1i64..50), 1..20)
}

fn movement_strategy() -> impl Strategy<Value = (bool, i64)> {
    (any::<bool>(), 1i64..500_000)
}

fn plan(monthly: i64, yearly: i64, tier: &str) -> SubscriptionPlan {
    SubscriptionPlan {
        id: format!("{}-{}", tier, monthly),
        name: tier.to_string(),
        tier_group: tier.to_string(),
        monthly_price: Money::from_pesos(monthly),
        yearly_price: Money::from_pesos(yearly),
        max_branches: None,
    }
}

// Property: net + tax always reconstructs the gross total
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn cart_net_plus_tax_equals_total(lines in lines_strategy()) {
        let mut cart = Cart::new();
        for (i, (price, qty)) in lines.iter().enumerate() {
            let id = format!("p-{}", i);
            cart.add_line(CartProduct::catalog(&id, "item", Money::from_pesos(*price), None)).unwrap();
            cart.set_quantity(i, *qty).unwrap();
        }

        let expected: i64 = lines.iter().map(|(p, q)| p * q).sum();
        prop_assert_eq!(cart.total().pesos(), expected);
        prop_assert_eq!(cart.net() + cart.tax(), cart.total());
    }

    #[test]
    fn split_tax_is_close_to_nineteen_percent(total in 0i64..100_000_000) {
        let (net, tax) = Money::from_pesos(total).split_inclusive(IVA);
        prop_assert_eq!(net.pesos() + tax.pesos(), total);

        // |net × 1.19 − total| ≤ 0.595, i.e. at most half a peso of net
        let error = (net.pesos() as i128 * 11_900 - total as i128 * 10_000).abs();
        prop_assert!(error <= 5_950, "net {} too far from {} / 1.19", net.pesos(), total);
    }

    #[test]
    fn set_quantity_always_stays_in_range(qty in any::<i64>()) {
        let mut cart = Cart::new();
        cart.add_line(CartProduct::catalog("p-1", "item", Money::from_pesos(1_000), None)).unwrap();
        let stored = cart.set_quantity(0, qty).unwrap();
        prop_assert!((1..=MAX_LINE_QUANTITY).contains(&stored));
    }
}

// Property: till balance is float plus ingresses minus egresses
proptest! {
    #[test]
    fn till_balance_matches_summary(
        float in 0i64..1_000_000,
        moves in prop::collection::vec(movement_strategy(), 0..40),
    ) {
        let movements: Vec<CashMovement> = moves
            .iter()
            .map(|(is_in, amount)| {
                let kind = if *is_in { MovementKind::Ingress } else { MovementKind::Egress };
                CashMovement::manual("s-1", kind, Money::from_pesos(*amount), "prop").unwrap()
            })
            .collect();

        let expected: i64 = float
            + moves.iter().map(|(is_in, a)| if *is_in { *a } else { -*a }).sum::<i64>();

        let opening = Money::from_pesos(float);
        prop_assert_eq!(balance(opening, &movements).pesos(), expected);
        prop_assert_eq!(TillSummary::compute(opening, &movements).balance.pesos(), expected);
    }

    #[test]
    fn close_difference_is_counted_minus_expected(expected in 0i64..5_000_000, counted in 0i64..5_000_000) {
        let report = CloseReport::new("s-1", Money::from_pesos(expected), Money::from_pesos(counted));
        prop_assert_eq!(report.difference.pesos(), counted - expected);
    }
}

// Property: proration never exceeds the target price and never goes negative
proptest! {
    #[test]
    fn proration_is_bounded(
        current in 1_000i64..100_000,
        target in 1_000i64..100_000,
        days in -10i64..400,
        is_yearly in any::<bool>(),
        current_yearly in any::<bool>(),
    ) {
        let current_plan = plan(current, current * 10, "a");
        let target_plan = plan(target, target * 10, "b");
        let selection = PlanSelection::new(current_plan, BillingPeriod::from_yearly(current_yearly));

        let charge = prorated_charge(&selection, &target_plan, days, is_yearly);
        let target_price = target_plan.price_for(BillingPeriod::from_yearly(is_yearly));

        prop_assert!(!charge.is_negative());
        if days <= 0 {
            prop_assert_eq!(charge, target_price);
        }
        if days > 0 && days <= BillingPeriod::from_yearly(is_yearly).length_days() {
            prop_assert!(charge <= target_price);
        }
    }
}

// Property: every computed check digit parses back
proptest! {
    #[test]
    fn computed_check_digit_round_trips(body in 1_000_000u32..99_999_999) {
        let rut = format!("{}-{}", body, rut_check_digit(body));
        prop_assert_eq!(parse_rut(&rut).unwrap(), (body, rut_check_digit(body)));
    }
}
