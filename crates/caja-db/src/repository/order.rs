//! # Order Repository
//!
//! Persists emitted sales and the cash ingress they put in the till.
//!
//! ## Sale Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_sale(order, items)                                              │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    INSERT orders            (UNIQUE company + type + folio)             │
//! │    INSERT order_items × N                                               │
//! │    SELECT open session for order.branch_id                              │
//! │    INSERT cash_movements    (only if session still open, amount > 0)    │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  The ingress goes to whichever session is open when the sale is        │
//! │  written, not the one that was open when checkout started.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::{CashMovement, DocumentType, Order, OrderItem};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::till::insert_movement;

const ORDER_COLUMNS: &str = "id, company_id, branch_id, document_type, folio, amount, net, tax, \
                             quantity, payment_method, customer_id, document_artifact_url, \
                             user_id, created_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, name, unit_price, quantity, subtotal, unit_cost";

/// What `record_sale` wrote.
#[derive(Debug, Clone)]
pub struct RecordedSale {
    pub order_id: String,
    /// The till ingress, or `None` when no session was open at write time
    /// or the sale had no amount.
    pub ingress: Option<CashMovement>,
}

/// Repository for orders and their items.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Writes an order, its items and the matching till ingress atomically.
    ///
    /// ## Errors
    /// * `UniqueViolation` - The folio is already on another order
    /// * `Busy` - Write lock held too long; nothing was written
    pub async fn record_sale(&self, order: &Order, items: &[OrderItem]) -> DbResult<RecordedSale> {
        debug!(
            order_id = %order.id,
            document_type = %order.document_type,
            folio = ?order.folio,
            items = items.len(),
            "Recording sale"
        );

        let mut tx = self.pool.begin().await?;

        insert_order(&mut tx, order).await?;
        for item in items {
            insert_item(&mut tx, item).await?;
        }

        let session_id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM cash_sessions WHERE branch_id = ?1 AND closing_count IS NULL",
        )
        .bind(&order.branch_id)
        .fetch_optional(&mut *tx)
        .await?;

        let ingress = match session_id {
            Some(session_id) if order.amount.is_positive() => {
                let movement = CashMovement::sale(
                    &session_id,
                    order.amount,
                    order.document_type,
                    order.folio,
                    &order.id,
                )?;
                insert_movement(&mut tx, &movement).await?;
                Some(movement)
            }
            Some(_) => None,
            None => {
                warn!(
                    order_id = %order.id,
                    branch_id = %order.branch_id,
                    "No open till when recording sale, ingress skipped"
                );
                None
            }
        };

        tx.commit().await?;

        info!(
            order_id = %order.id,
            amount = %order.amount,
            folio = ?order.folio,
            "Sale recorded"
        );

        Ok(RecordedSale {
            order_id: order.id.clone(),
            ingress,
        })
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Finds the order that carries a folio.
    pub async fn find_by_folio(
        &self,
        company_id: &str,
        document_type: DocumentType,
        folio: i64,
    ) -> DbResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE company_id = ?1 AND document_type = ?2 AND folio = ?3",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(company_id)
            .bind(document_type)
            .bind(folio)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Items of an order, in the order they were rung up.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY rowid",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Recent orders of a branch, newest first.
    pub async fn list_for_branch(&self, branch_id: &str, limit: i64) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE branch_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(branch_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Gets an order or fails with `NotFound`.
    pub async fn require(&self, id: &str) -> DbResult<Order> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }
}

async fn insert_order(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, company_id, branch_id, document_type, folio, amount, net, tax,
            quantity, payment_method, customer_id, document_artifact_url, user_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&order.id)
    .bind(&order.company_id)
    .bind(&order.branch_id)
    .bind(order.document_type)
    .bind(order.folio)
    .bind(order.amount)
    .bind(order.net)
    .bind(order.tax)
    .bind(order.quantity)
    .bind(order.payment_method)
    .bind(&order.customer_id)
    .bind(&order.document_artifact_url)
    .bind(&order.user_id)
    .bind(order.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_item(tx: &mut Transaction<'_, Sqlite>, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (id, order_id, product_id, name, unit_price, quantity, subtotal, unit_cost)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .bind(item.subtotal)
    .bind(item.unit_cost)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
