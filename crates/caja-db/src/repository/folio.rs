//! # Folio Repository
//!
//! Authorized folio ranges (CAF) and the allocation that hands them out.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate(company, boleta)                                              │
//! │                                                                         │
//! │  UPDATE folio_pools                                                     │
//! │     SET next_folio = next_folio + 1                                     │
//! │   WHERE id = (lowest non-exhausted pool for company + type)             │
//! │  RETURNING next_folio - 1                                               │
//! │                                                                         │
//! │  pool A  [  1 ..  99]  next = 100  ── exhausted, skipped                │
//! │  pool B  [100 .. 500]  next = 137  ── picked, returns 137               │
//! │                                                                         │
//! │  No row returned → EXHAUSTED. The read and the increment are one       │
//! │  statement, so SQLite's write lock serializes concurrent terminals     │
//! │  and no folio is ever returned twice.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::folio::validate_range;
use caja_core::{CoreError, DocumentType, FolioPool};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Repository for folio pools.
#[derive(Debug, Clone)]
pub struct FolioRepository {
    pool: SqlitePool,
}

impl FolioRepository {
    /// Creates a new FolioRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FolioRepository { pool }
    }

    /// Hands out the next folio for a company and document type.
    ///
    /// ## Errors
    /// * `Domain(FolioExhausted)` - No pool has folios left
    /// * `Domain(InvalidSale)` - The document type carries no folio
    /// * `Busy` - Another terminal held the write lock too long; nothing
    ///   was consumed
    pub async fn allocate(&self, company_id: &str, document_type: DocumentType) -> DbResult<i64> {
        if !document_type.requires_folio() {
            return Err(CoreError::InvalidSale(format!(
                "{} documents are not numbered",
                document_type
            ))
            .into());
        }

        let folio: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE folio_pools
               SET next_folio = next_folio + 1
             WHERE id = (
                SELECT id
                  FROM folio_pools
                 WHERE company_id = ?1
                   AND document_type = ?2
                   AND next_folio <= last_folio
                 ORDER BY next_folio ASC
                 LIMIT 1
             )
            RETURNING next_folio - 1
            "#,
        )
        .bind(company_id)
        .bind(document_type)
        .fetch_optional(&self.pool)
        .await?;

        match folio {
            Some(folio) => {
                debug!(company_id = %company_id, %document_type, folio, "Folio allocated");
                Ok(folio)
            }
            None => {
                warn!(company_id = %company_id, %document_type, "Folio pools exhausted");
                Err(CoreError::FolioExhausted {
                    company_id: company_id.to_string(),
                    document_type,
                }
                .into())
            }
        }
    }

    /// Folios left across all pools of a company and document type.
    pub async fn remaining(&self, company_id: &str, document_type: DocumentType) -> DbResult<i64> {
        let remaining: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(MAX(last_folio - next_folio + 1, 0)), 0)
              FROM folio_pools
             WHERE company_id = ?1 AND document_type = ?2
            "#,
        )
        .bind(company_id)
        .bind(document_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(remaining)
    }

    /// Registers a newly authorized range.
    ///
    /// ## Errors
    /// * `Domain(InvalidFolioRange)` - Empty, below 1, or overlapping
    /// * `Domain(InvalidSale)` - Document type carries no folio
    pub async fn register_pool(
        &self,
        company_id: &str,
        document_type: DocumentType,
        first: i64,
        last: i64,
    ) -> DbResult<FolioPool> {
        if !document_type.requires_folio() {
            return Err(CoreError::InvalidSale(format!(
                "{} documents are not numbered",
                document_type
            ))
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, FolioPool>(
            r#"
            SELECT id, company_id, document_type, first_folio, next_folio, last_folio
              FROM folio_pools
             WHERE company_id = ?1 AND document_type = ?2
            "#,
        )
        .bind(company_id)
        .bind(document_type)
        .fetch_all(&mut *tx)
        .await?;

        validate_range(first, last, &existing)?;

        let pool = FolioPool {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            document_type,
            first_folio: first,
            next_folio: first,
            last_folio: last,
        };

        sqlx::query(
            r#"
            INSERT INTO folio_pools (id, company_id, document_type, first_folio, next_folio, last_folio, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&pool.id)
        .bind(&pool.company_id)
        .bind(pool.document_type)
        .bind(pool.first_folio)
        .bind(pool.next_folio)
        .bind(pool.last_folio)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            company_id = %company_id,
            %document_type,
            first,
            last,
            "Folio range registered"
        );
        Ok(pool)
    }

    /// Lists pools for a company and document type, lowest range first.
    pub async fn list(&self, company_id: &str, document_type: DocumentType) -> DbResult<Vec<FolioPool>> {
        let pools = sqlx::query_as::<_, FolioPool>(
            r#"
            SELECT id, company_id, document_type, first_folio, next_folio, last_folio
              FROM folio_pools
             WHERE company_id = ?1 AND document_type = ?2
             ORDER BY first_folio ASC
            "#,
        )
        .bind(company_id)
        .bind(document_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(pools)
    }

    /// Gets a pool by ID.
    pub async fn get(&self, id: &str) -> DbResult<FolioPool> {
        sqlx::query_as::<_, FolioPool>(
            r#"
            SELECT id, company_id, document_type, first_folio, next_folio, last_folio
              FROM folio_pools
             WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("FolioPool", id))
    }
}
