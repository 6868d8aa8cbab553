//! # Company Repository
//!
//! Issuer profiles, branches and subscription plans.
//!
//! ## Branch Ceiling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_branch(branch)                                                  │
//! │                                                                         │
//! │  INSERT INTO branches ... SELECT ...                                    │
//! │  WHERE NOT EXISTS (plan has max_branches AND count ≥ max_branches)      │
//! │                                                                         │
//! │  The count and the insert are one statement, so two terminals adding  │
//! │  the last allowed branch at the same time cannot both succeed.         │
//! │                                                                         │
//! │  rows_affected = 0  →  BRANCH_LIMIT_REACHED                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::plan::can_create_branch;
use caja_core::{BillingPeriod, Branch, Company, CoreError, PlanSelection, SubscriptionPlan, TaxId};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Raw company row. The RUT is validated when converting to [`Company`].
#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: String,
    rut: String,
    business_name: String,
    giro: String,
    address: String,
    commune: String,
    credential_ref: Option<String>,
    plan_id: Option<String>,
    billing_period: BillingPeriod,
}

impl TryFrom<CompanyRow> for Company {
    type Error = DbError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        let tax_id = TaxId::parse(&row.rut).map_err(CoreError::from)?;
        Ok(Company {
            id: row.id,
            tax_id,
            business_name: row.business_name,
            giro: row.giro,
            address: row.address,
            commune: row.commune,
            credential_ref: row.credential_ref,
            plan_id: row.plan_id,
            billing_period: row.billing_period,
        })
    }
}

const COMPANY_COLUMNS: &str = "id, rut, business_name, giro, address, commune, \
                               credential_ref, plan_id, billing_period";

/// Repository for companies, branches and plans.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    /// Creates a new CompanyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CompanyRepository { pool }
    }

    // =========================================================================
    // Companies
    // =========================================================================

    /// Inserts a company.
    pub async fn insert(&self, company: &Company) -> DbResult<()> {
        debug!(id = %company.id, rut = %company.tax_id, "Inserting company");

        sqlx::query(
            r#"
            INSERT INTO companies (
                id, rut, business_name, giro, address, commune,
                credential_ref, plan_id, billing_period, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&company.id)
        .bind(company.tax_id.to_string())
        .bind(&company.business_name)
        .bind(&company.giro)
        .bind(&company.address)
        .bind(&company.commune)
        .bind(&company.credential_ref)
        .bind(&company.plan_id)
        .bind(company.billing_period)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a company by ID.
    ///
    /// ## Returns
    /// * `Ok(None)` - No such company
    /// * `Err(DbError::Domain(..))` - Stored RUT is invalid
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Company>> {
        let sql = format!("SELECT {} FROM companies WHERE id = ?1", COMPANY_COLUMNS);
        let row: Option<CompanyRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Company::try_from).transpose()
    }

    /// Gets a company or fails with `NotFound`.
    pub async fn require(&self, id: &str) -> DbResult<Company> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Company", id))
    }

    /// Binds a company to a plan and billing period.
    pub async fn set_plan(&self, company_id: &str, plan_id: &str, period: BillingPeriod) -> DbResult<()> {
        info!(company_id = %company_id, plan_id = %plan_id, ?period, "Changing plan binding");

        let result = sqlx::query("UPDATE companies SET plan_id = ?2, billing_period = ?3 WHERE id = ?1")
            .bind(company_id)
            .bind(plan_id)
            .bind(period)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", company_id));
        }
        Ok(())
    }

    // =========================================================================
    // Plans
    // =========================================================================

    /// Inserts a subscription plan.
    pub async fn insert_plan(&self, plan: &SubscriptionPlan) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO plans (id, name, tier_group, monthly_price, yearly_price, max_branches)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&plan.id)
        .bind(&plan.name)
        .bind(&plan.tier_group)
        .bind(plan.monthly_price)
        .bind(plan.yearly_price)
        .bind(plan.max_branches)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a plan by ID.
    pub async fn get_plan(&self, id: &str) -> DbResult<Option<SubscriptionPlan>> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            SELECT id, name, tier_group, monthly_price, yearly_price, max_branches
            FROM plans
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    /// The company's current plan and billing period, if bound to one.
    pub async fn plan_selection(&self, company_id: &str) -> DbResult<Option<PlanSelection>> {
        let company = self.require(company_id).await?;
        let Some(plan_id) = company.plan_id.as_deref() else {
            return Ok(None);
        };

        let plan = self
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| DbError::not_found("Plan", plan_id))?;

        Ok(Some(PlanSelection::new(plan, company.billing_period)))
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Number of branches a company has.
    pub async fn count_branches(&self, company_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM branches WHERE company_id = ?1")
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Whether the company's plan allows one more branch.
    ///
    /// Companies without a plan binding have no ceiling.
    pub async fn can_create_branch(&self, company_id: &str) -> DbResult<bool> {
        let max = self.max_branches(company_id).await?;
        let count = self.count_branches(company_id).await?;
        Ok(can_create_branch(max, count))
    }

    /// Inserts a branch if the plan ceiling allows it.
    ///
    /// ## Errors
    /// * `NotFound` - Company doesn't exist
    /// * `Domain(BranchLimitReached)` - Ceiling reached
    pub async fn create_branch(&self, branch: &Branch) -> DbResult<()> {
        let max = self.max_branches(&branch.company_id).await?;

        debug!(company_id = %branch.company_id, name = %branch.name, ?max, "Creating branch");

        let result = sqlx::query(
            r#"
            INSERT INTO branches (id, company_id, name, address, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE NOT EXISTS (
                SELECT 1
                FROM companies c
                JOIN plans p ON p.id = c.plan_id
                WHERE c.id = ?2
                  AND p.max_branches IS NOT NULL
                  AND (SELECT COUNT(*) FROM branches b WHERE b.company_id = ?2) >= p.max_branches
            )
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.company_id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(branch.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::BranchLimitReached {
                max: max.unwrap_or_default(),
            }
            .into());
        }

        info!(branch_id = %branch.id, company_id = %branch.company_id, "Branch created");
        Ok(())
    }

    /// Gets a branch by ID.
    pub async fn get_branch(&self, id: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            "SELECT id, company_id, name, address, created_at FROM branches WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(branch)
    }

    /// Lists a company's branches, oldest first.
    pub async fn list_branches(&self, company_id: &str) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, company_id, name, address, created_at
            FROM branches
            WHERE company_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(branches)
    }

    async fn max_branches(&self, company_id: &str) -> DbResult<Option<i64>> {
        Ok(self
            .plan_selection(company_id)
            .await?
            .and_then(|selection| selection.plan.max_branches))
    }
}
