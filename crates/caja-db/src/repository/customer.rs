//! # Customer Repository
//!
//! Document receivers. The RUT is stored exactly as typed; reads parse it
//! and drop it when the check digit does not match, so an invoice can
//! never go out to a malformed tax id.

use caja_core::validation::validate_name;
use caja_core::{CoreError, Customer, TaxId};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Fields accepted when registering a customer.
#[derive(Debug, Clone, Default)]
pub struct CustomerInput {
    pub rut: Option<String>,
    pub name: String,
    pub giro: Option<String>,
    pub address: Option<String>,
    pub commune: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    company_id: String,
    rut: Option<String>,
    name: String,
    giro: Option<String>,
    address: Option<String>,
    commune: Option<String>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        let tax_id = row.rut.as_deref().and_then(|raw| match TaxId::parse(raw) {
            Ok(tax_id) => Some(tax_id),
            Err(err) => {
                warn!(customer_id = %row.id, error = %err, "Stored RUT is invalid, ignoring it");
                None
            }
        });

        Customer {
            id: row.id,
            company_id: row.company_id,
            tax_id,
            name: row.name,
            giro: row.giro,
            address: row.address,
            commune: row.commune,
        }
    }
}

const CUSTOMER_COLUMNS: &str = "id, company_id, rut, name, giro, address, commune";

/// Repository for customers.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Registers a customer and returns it as it will be read back.
    pub async fn insert(&self, company_id: &str, input: &CustomerInput) -> DbResult<Customer> {
        let name = validate_name("name", &input.name).map_err(CoreError::from)?;
        let id = Uuid::new_v4().to_string();
        let rut = input
            .rut
            .as_deref()
            .map(str::trim)
            .filter(|rut| !rut.is_empty());

        debug!(customer_id = %id, company_id = %company_id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, company_id, rut, name, giro, address, commune, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&id)
        .bind(company_id)
        .bind(rut)
        .bind(&name)
        .bind(&input.giro)
        .bind(&input.address)
        .bind(&input.commune)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.require(&id).await
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS);
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Customer::from))
    }

    /// Gets a customer or fails with `NotFound`.
    pub async fn require(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Customers of a company whose name or RUT contains `query`.
    pub async fn search(&self, company_id: &str, query: &str, limit: i64) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());
        let sql = format!(
            "SELECT {} FROM customers WHERE company_id = ?1 AND (name LIKE ?2 OR rut LIKE ?2) \
             ORDER BY name LIMIT ?3",
            CUSTOMER_COLUMNS
        );
        let rows: Vec<CustomerRow> = sqlx::query_as(&sql)
            .bind(company_id)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }
}
