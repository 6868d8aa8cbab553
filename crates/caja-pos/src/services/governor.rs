//! # Plan Governor
//!
//! Keeps a company inside what its subscription plan allows and prices
//! plan changes.
//!
//! ## Proration
//! ```text
//! current: Emprende monthly 15.990     target: Pyme monthly 20.990
//! 15 of 30 days left
//!
//! charge = round((20.990 − 15.990) / 30 × 15) = 2.500
//! ```
//! The rules themselves live in `caja_core::plan`; this service loads the
//! company's binding and the target plan and applies them.

use caja_core::plan::prorated_charge;
use caja_core::validation::validate_name;
use caja_core::{BillingPeriod, Branch, CoreError, Money};
use caja_db::Database;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use crate::config::TerminalConfig;
use crate::error::{ApiError, ApiResult};

/// Price of moving to another plan today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PlanQuote {
    pub current_plan_id: Option<String>,
    pub target_plan_id: String,
    pub target_period: BillingPeriod,
    pub charge: Money,
}

#[derive(Clone)]
pub struct PlanGovernor {
    db: Database,
    terminal: TerminalConfig,
}

impl PlanGovernor {
    pub fn new(db: Database, terminal: TerminalConfig) -> Self {
        PlanGovernor { db, terminal }
    }

    /// Whether the company may open one more branch.
    pub async fn can_create_branch(&self) -> ApiResult<bool> {
        Ok(self
            .db
            .companies()
            .can_create_branch(&self.terminal.company_id)
            .await?)
    }

    /// Creates a branch if the plan ceiling allows it.
    ///
    /// ## Errors
    /// * `BRANCH_LIMIT_REACHED` - The plan's ceiling is already reached
    pub async fn create_branch(&self, name: &str, address: Option<&str>) -> ApiResult<Branch> {
        let name = validate_name("name", name).map_err(CoreError::from)?;

        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            company_id: self.terminal.company_id.clone(),
            name,
            address: address
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            created_at: Utc::now(),
        };
        self.db.companies().create_branch(&branch).await?;
        Ok(branch)
    }

    /// What switching to `target_plan_id` costs with `days_remaining` left
    /// in the current period.
    ///
    /// A company without a plan pays the full target price.
    pub async fn quote_plan_change(
        &self,
        target_plan_id: &str,
        is_yearly: bool,
        days_remaining: i64,
    ) -> ApiResult<PlanQuote> {
        let companies = self.db.companies();
        let target = companies
            .get_plan(target_plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("SubscriptionPlan", target_plan_id))?;
        let target_period = BillingPeriod::from_yearly(is_yearly);

        let current = companies.plan_selection(&self.terminal.company_id).await?;
        let charge = match current {
            Some(ref current) => prorated_charge(current, &target, days_remaining, is_yearly),
            None => target.price_for(target_period),
        };

        Ok(PlanQuote {
            current_plan_id: current.map(|c| c.plan.id),
            target_plan_id: target.id,
            target_period,
            charge,
        })
    }

    /// Binds the company to `target_plan_id` and returns what was charged.
    pub async fn change_plan(
        &self,
        target_plan_id: &str,
        is_yearly: bool,
        days_remaining: i64,
    ) -> ApiResult<PlanQuote> {
        let quote = self
            .quote_plan_change(target_plan_id, is_yearly, days_remaining)
            .await?;

        self.db
            .companies()
            .set_plan(&self.terminal.company_id, &quote.target_plan_id, quote.target_period)
            .await?;

        info!(
            company_id = %self.terminal.company_id,
            from = ?quote.current_plan_id,
            to = %quote.target_plan_id,
            charge = %quote.charge,
            "Plan changed"
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::testing;
    use caja_core::ErrorKind;

    async fn governor() -> PlanGovernor {
        let db = testing::database().await;
        let companies = db.companies();
        companies
            .insert_plan(&testing::plan("pyme", "basic", 20_990, 209_900, Some(3)))
            .await
            .unwrap();
        PlanGovernor::new(db, testing::terminal())
    }

    #[tokio::test]
    async fn test_branch_ceiling() {
        let governor = governor().await;

        // "emprende" allows one branch and b-1 already exists
        assert!(!governor.can_create_branch().await.unwrap());
        let err = governor.create_branch("Providencia", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BranchLimitReached);
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);

        governor.change_plan("pyme", false, 0).await.unwrap();
        assert!(governor.can_create_branch().await.unwrap());
        let branch = governor
            .create_branch("  Providencia  ", Some("Av. Providencia 1234"))
            .await
            .unwrap();
        assert_eq!(branch.name, "Providencia");
        governor.create_branch("Maipú", None).await.unwrap();

        let err = governor.create_branch("Puente Alto", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BranchLimitReached);
    }

    #[tokio::test]
    async fn test_same_period_upgrade_is_prorated() {
        let governor = governor().await;

        let quote = governor.quote_plan_change("pyme", false, 15).await.unwrap();
        assert_eq!(quote.charge.pesos(), 2_500);
        assert_eq!(quote.current_plan_id.as_deref(), Some("emprende"));
        assert_eq!(quote.target_period, BillingPeriod::Monthly);
    }

    #[tokio::test]
    async fn test_monthly_to_yearly_same_tier_pays_full_year() {
        let governor = governor().await;
        let quote = governor.quote_plan_change("pyme", true, 10).await.unwrap();
        assert_eq!(quote.charge.pesos(), 209_900);
    }

    #[tokio::test]
    async fn test_downgrade_is_free() {
        let governor = governor().await;
        governor.change_plan("pyme", false, 0).await.unwrap();

        let quote = governor.quote_plan_change("emprende", false, 20).await.unwrap();
        assert_eq!(quote.charge, Money::zero());
    }

    #[tokio::test]
    async fn test_unknown_target_plan() {
        let governor = governor().await;
        let err = governor.quote_plan_change("enterprise", false, 10).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
