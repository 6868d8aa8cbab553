//! # Catalog Repository
//!
//! Products and categories.
//!
//! ## Ad-hoc Products
//! ```text
//! Cashier types "Bolsa compostable  $150"
//!      │
//!      ▼
//! create_custom(company, name, price)
//!      │  BEGIN
//!      │    INSERT category "General" ON CONFLICT DO NOTHING
//!      │    SELECT its id
//!      │    INSERT product (is_custom = 1, stock = 0)
//!      │  COMMIT
//!      ▼
//! Product → CartProduct::custom(..) → cart line
//! ```

use caja_core::validation::{validate_name, validate_price};
use caja_core::{Category, CoreError, Money, Product, DEFAULT_CATEGORY_NAME};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, company_id, category_id, name, price, cost, stock, is_custom, created_at";

// =============================================================================
// Products
// =============================================================================

/// Repository for catalog products.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, company_id, category_id, name, price, cost, stock, is_custom, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.company_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.cost)
        .bind(product.stock)
        .bind(product.is_custom)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Lists a company's products by name.
    pub async fn list(&self, company_id: &str, limit: i64, offset: i64) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE company_id = ?1 ORDER BY name LIMIT ?2 OFFSET ?3",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(company_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Case-insensitive name search.
    pub async fn search(&self, company_id: &str, query: &str, limit: i64) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());
        let sql = format!(
            "SELECT {} FROM products WHERE company_id = ?1 AND name LIKE ?2 ORDER BY name LIMIT ?3",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(company_id)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn count(&self, company_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE company_id = ?1")
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Lowers tracked stock after a sale, never below zero.
    ///
    /// Products without stock tracking are left alone. Returns whether a
    /// row was touched.
    pub async fn decrement_stock(&self, id: &str, quantity: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
               SET stock = MAX(stock - ?2, 0)
             WHERE id = ?1 AND stock IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Creates an ad-hoc product under the "General" category.
    ///
    /// ## Errors
    /// * `Domain(Validation)` - Empty or too-long name, or negative price
    pub async fn create_custom(&self, company_id: &str, name: &str, price: Money) -> DbResult<Product> {
        let name = validate_name("name", name).map_err(CoreError::from)?;
        validate_price(price).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        let category = get_or_create_category(&mut tx, company_id, DEFAULT_CATEGORY_NAME).await?;

        let product = Product {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            category_id: Some(category.id),
            name,
            price,
            cost: None,
            stock: Some(0),
            is_custom: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO products (id, company_id, category_id, name, price, cost, stock, is_custom, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 1, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.company_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(product_id = %product.id, name = %product.name, price = %price, "Ad-hoc product created");
        Ok(product)
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Repository for catalog categories.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Returns the named category, creating it if needed.
    pub async fn get_or_create(&self, company_id: &str, name: &str) -> DbResult<Category> {
        let mut tx = self.pool.begin().await?;
        let category = get_or_create_category(&mut tx, company_id, name).await?;
        tx.commit().await?;
        Ok(category)
    }

    pub async fn list(&self, company_id: &str) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, company_id, name FROM categories WHERE company_id = ?1 ORDER BY name",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}

async fn get_or_create_category(
    tx: &mut Transaction<'_, Sqlite>,
    company_id: &str,
    name: &str,
) -> DbResult<Category> {
    sqlx::query(
        r#"
        INSERT INTO categories (id, company_id, name)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (company_id, name) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(company_id)
    .bind(name)
    .execute(&mut **tx)
    .await?;

    sqlx::query_as::<_, Category>(
        "SELECT id, company_id, name FROM categories WHERE company_id = ?1 AND name = ?2",
    )
    .bind(company_id)
    .bind(name)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| DbError::not_found("Category", name))
}
