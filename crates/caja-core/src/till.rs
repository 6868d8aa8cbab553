//! # Till Module
//!
//! Cash sessions (caja), movements and the close-of-day report.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open(branch, float)                                                   │
//! │        │           at most one session with closing_count = NULL       │
//! │        ▼           per branch                                          │
//! │   ┌─────────┐                                                           │
//! │   │  OPEN   │◄── sale ingress (one per emitted document)               │
//! │   │         │◄── manual ingress / egress (amount > 0, reason)          │
//! │   └────┬────┘                                                           │
//! │        │ close(counted)                                                 │
//! │        ▼                                                                │
//! │   ┌─────────┐   expected   = float + Σ ingress − Σ egress               │
//! │   │ CLOSED  │   difference = counted − expected                        │
//! │   └─────────┘   > 0 sobra, < 0 falta, = 0 cuadrada                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::folio::DocumentType;
use crate::money::Money;
use crate::validation::{validate_movement_amount, validate_reason};

// =============================================================================
// Cash Session
// =============================================================================

/// One till session for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opening_float: Money,
    /// Cash counted at close. `None` while the session is open.
    pub closing_count: Option<Money>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub opened_by: String,
}

impl CashSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.closing_count.is_none()
    }
}

// =============================================================================
// Cash Movement
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Ingress,
    Egress,
}

/// An append-only entry in a session. Exactly one side is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub session_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub ingress: Option<Money>,
    pub egress: Option<Money>,
    pub reason: String,
    /// Set on sale ingresses.
    pub document_type: Option<DocumentType>,
    pub order_id: Option<String>,
}

impl CashMovement {
    /// A manual movement, validated.
    ///
    /// `INVALID_AMOUNT` unless `amount > 0`; `INVALID_REASON` unless the
    /// trimmed reason is non-empty.
    pub fn manual(
        session_id: &str,
        kind: MovementKind,
        amount: Money,
        reason: &str,
    ) -> CoreResult<Self> {
        validate_movement_amount(amount)?;
        let reason = validate_reason(reason)?;

        let (ingress, egress) = match kind {
            MovementKind::Ingress => (Some(amount), None),
            MovementKind::Egress => (None, Some(amount)),
        };

        Ok(CashMovement {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            ingress,
            egress,
            reason,
            document_type: None,
            order_id: None,
        })
    }

    /// The ingress recorded for an emitted sale.
    pub fn sale(
        session_id: &str,
        amount: Money,
        document_type: DocumentType,
        folio: Option<i64>,
        order_id: &str,
    ) -> CoreResult<Self> {
        validate_movement_amount(amount)?;

        let reason = match folio {
            Some(folio) => format!("Venta {} N° {}", document_type, folio),
            None => format!("Venta {}", document_type),
        };

        Ok(CashMovement {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            ingress: Some(amount),
            egress: None,
            reason,
            document_type: Some(document_type),
            order_id: Some(order_id.to_string()),
        })
    }

    pub fn kind(&self) -> MovementKind {
        if self.ingress.is_some() {
            MovementKind::Ingress
        } else {
            MovementKind::Egress
        }
    }

    /// Signed effect on the balance: +ingress or −egress.
    pub fn signed_amount(&self) -> Money {
        self.ingress.unwrap_or_default() - self.egress.unwrap_or_default()
    }
}

// =============================================================================
// Balance & Summary
// =============================================================================

/// `opening_float + Σ ingress − Σ egress`.
pub fn balance(opening_float: Money, movements: &[CashMovement]) -> Money {
    opening_float + movements.iter().map(CashMovement::signed_amount).sum::<Money>()
}

/// Running totals of a session for the till screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TillSummary {
    pub opening_float: Money,
    pub total_ingress: Money,
    pub total_egress: Money,
    pub balance: Money,
    pub movement_count: usize,
}

impl TillSummary {
    pub fn compute(opening_float: Money, movements: &[CashMovement]) -> Self {
        let total_ingress: Money = movements.iter().filter_map(|m| m.ingress).sum();
        let total_egress: Money = movements.iter().filter_map(|m| m.egress).sum();
        TillSummary {
            opening_float,
            total_ingress,
            total_egress,
            balance: opening_float + total_ingress - total_egress,
            movement_count: movements.len(),
        }
    }
}

// =============================================================================
// Close Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CloseStatus {
    Balanced,
    /// More cash than expected.
    Over,
    /// Less cash than expected.
    Short,
}

impl CloseStatus {
    /// Label shown to the cashier.
    pub const fn label(&self) -> &'static str {
        match self {
            CloseStatus::Balanced => "cuadrada",
            CloseStatus::Over => "sobra",
            CloseStatus::Short => "falta",
        }
    }
}

/// Expected vs counted at close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CloseReport {
    pub session_id: String,
    pub expected: Money,
    pub counted: Money,
    /// counted − expected.
    pub difference: Money,
    pub status: CloseStatus,
}

impl CloseReport {
    pub fn new(session_id: &str, expected: Money, counted: Money) -> Self {
        let difference = counted - expected;
        let status = if difference.is_zero() {
            CloseStatus::Balanced
        } else if difference.is_positive() {
            CloseStatus::Over
        } else {
            CloseStatus::Short
        };

        CloseReport {
            session_id: session_id.to_string(),
            expected,
            counted,
            difference,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_movement_validation() {
        let m = CashMovement::manual("s-1", MovementKind::Egress, Money::from_pesos(5_000), " cambio ")
            .unwrap();
        assert_eq!(m.egress, Some(Money::from_pesos(5_000)));
        assert_eq!(m.ingress, None);
        assert_eq!(m.reason, "cambio");
        assert_eq!(m.kind(), MovementKind::Egress);

        let err = CashMovement::manual("s-1", MovementKind::Ingress, Money::zero(), "x").unwrap_err();
        assert_eq!(err.code(), "INVALID_AMOUNT");

        let err = CashMovement::manual("s-1", MovementKind::Ingress, Money::from_pesos(10), "  ")
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_REASON");
    }

    #[test]
    fn test_sale_ingress_tags_document() {
        let m = CashMovement::sale("s-1", Money::from_pesos(20_000), DocumentType::Boleta, Some(100), "o-1")
            .unwrap();
        assert_eq!(m.ingress, Some(Money::from_pesos(20_000)));
        assert_eq!(m.document_type, Some(DocumentType::Boleta));
        assert_eq!(m.order_id.as_deref(), Some("o-1"));
        assert_eq!(m.reason, "Venta boleta N° 100");
    }

    #[test]
    fn test_balance_and_summary() {
        let movements = vec![
            CashMovement::manual("s-1", MovementKind::Ingress, Money::from_pesos(10_000), "venta").unwrap(),
            CashMovement::manual("s-1", MovementKind::Ingress, Money::from_pesos(5_000), "venta").unwrap(),
            CashMovement::manual("s-1", MovementKind::Egress, Money::from_pesos(2_000), "gas").unwrap(),
        ];
        assert_eq!(balance(Money::zero(), &movements).pesos(), 13_000);

        let summary = TillSummary::compute(Money::from_pesos(50_000), &movements);
        assert_eq!(summary.total_ingress.pesos(), 15_000);
        assert_eq!(summary.total_egress.pesos(), 2_000);
        assert_eq!(summary.balance.pesos(), 63_000);
        assert_eq!(summary.movement_count, 3);
    }

    #[test]
    fn test_close_report_short() {
        let report = CloseReport::new("s-1", Money::from_pesos(15_000), Money::from_pesos(14_500));
        assert_eq!(report.difference.pesos(), -500);
        assert_eq!(report.status, CloseStatus::Short);
        assert_eq!(report.status.label(), "falta");
    }

    #[test]
    fn test_close_report_over_and_balanced() {
        let over = CloseReport::new("s-1", Money::from_pesos(1_000), Money::from_pesos(1_200));
        assert_eq!(over.status.label(), "sobra");
        let even = CloseReport::new("s-1", Money::from_pesos(1_000), Money::from_pesos(1_000));
        assert_eq!(even.status, CloseStatus::Balanced);
    }
}
