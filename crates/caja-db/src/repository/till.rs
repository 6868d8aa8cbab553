//! # Till Repository
//!
//! Cash sessions (caja) and their append-only movements.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open(branch, float)                                                   │
//! │        │   unique index: one session with closing_count IS NULL         │
//! │        ▼                                                                │
//! │   ┌──────────┐  record_movement / sale ingress   ┌──────────┐          │
//! │   │   OPEN   │ ─────────────────────────────────►│   OPEN   │          │
//! │   └────┬─────┘                                   └──────────┘          │
//! │        │ close(counted)                                                 │
//! │        │   UPDATE ... WHERE closing_count IS NULL                       │
//! │        ▼                                                                │
//! │   ┌──────────┐                                                          │
//! │   │  CLOSED  │  expected = float + Σ ingress − Σ egress                 │
//! │   └──────────┘  difference = counted − expected                         │
//! │                                                                         │
//! │  Writes to a session carry the "still open" check in the same          │
//! │  statement, so a movement can never land after the close.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::validation::validate_cash_count;
use caja_core::{
    CashMovement, CashSession, CloseReport, CoreError, Money, MovementKind, TillSummary,
};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const SESSION_COLUMNS: &str = "id, company_id, branch_id, opened_at, opening_float, \
                               closing_count, closed_at, opened_by";

const MOVEMENT_COLUMNS: &str = "id, session_id, created_at, ingress, egress, reason, \
                                document_type, order_id";

/// Repository for cash sessions and movements.
#[derive(Debug, Clone)]
pub struct TillRepository {
    pool: SqlitePool,
}

impl TillRepository {
    /// Creates a new TillRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TillRepository { pool }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Opens a session for a branch.
    ///
    /// ## Errors
    /// * `Domain(InvalidAmount)` - Negative opening float
    /// * `Domain(TillAlreadyOpen)` - The branch already has an open session,
    ///   including one left open on an earlier day
    pub async fn open(
        &self,
        company_id: &str,
        branch_id: &str,
        opening_float: Money,
        opened_by: &str,
    ) -> DbResult<CashSession> {
        validate_cash_count("opening_float", opening_float)?;

        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            branch_id: branch_id.to_string(),
            opened_at: Utc::now(),
            opening_float,
            closing_count: None,
            closed_at: None,
            opened_by: opened_by.to_string(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO cash_sessions (id, company_id, branch_id, opened_at, opening_float, opened_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&session.id)
        .bind(&session.company_id)
        .bind(&session.branch_id)
        .bind(session.opened_at)
        .bind(session.opening_float)
        .bind(&session.opened_by)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(
                    session_id = %session.id,
                    branch_id = %branch_id,
                    opening_float = %opening_float,
                    "Till opened"
                );
                Ok(session)
            }
            Err(err) => {
                let err = DbError::from(err);
                if err.is_unique_on("cash_sessions.branch_id") {
                    return Err(CoreError::TillAlreadyOpen {
                        branch_id: branch_id.to_string(),
                    }
                    .into());
                }
                Err(err)
            }
        }
    }

    /// The branch's open session, if any.
    pub async fn current_session(&self, branch_id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!(
            "SELECT {} FROM cash_sessions WHERE branch_id = ?1 AND closing_count IS NULL",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(branch_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// The branch's open session, or `TILL_CLOSED`.
    pub async fn require_open(&self, branch_id: &str) -> DbResult<CashSession> {
        self.current_session(branch_id).await?.ok_or_else(|| {
            CoreError::TillClosed {
                branch_id: branch_id.to_string(),
            }
            .into()
        })
    }

    /// Gets a session by ID.
    pub async fn get(&self, session_id: &str) -> DbResult<CashSession> {
        let sql = format!("SELECT {} FROM cash_sessions WHERE id = ?1", SESSION_COLUMNS);
        sqlx::query_as::<_, CashSession>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", session_id))
    }

    /// Sessions of a branch, newest first.
    pub async fn history(&self, branch_id: &str, limit: i64) -> DbResult<Vec<CashSession>> {
        let sql = format!(
            "SELECT {} FROM cash_sessions WHERE branch_id = ?1 ORDER BY opened_at DESC LIMIT ?2",
            SESSION_COLUMNS
        );
        let sessions = sqlx::query_as::<_, CashSession>(&sql)
            .bind(branch_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Records a manual ingress or egress on an open session.
    ///
    /// ## Errors
    /// * `Domain(InvalidAmount)` / `Domain(InvalidReason)` - Bad input
    /// * `Domain(SessionClosed)` - Session was closed
    /// * `NotFound` - No such session
    pub async fn record_movement(
        &self,
        session_id: &str,
        kind: MovementKind,
        amount: Money,
        reason: &str,
    ) -> DbResult<CashMovement> {
        let movement = CashMovement::manual(session_id, kind, amount, reason)?;

        let mut tx = self.pool.begin().await?;
        insert_movement(&mut tx, &movement).await?;
        tx.commit().await?;

        info!(
            session_id = %session_id,
            ?kind,
            amount = %amount,
            "Cash movement recorded"
        );
        Ok(movement)
    }

    /// Movements of a session, newest first.
    pub async fn movements(&self, session_id: &str) -> DbResult<Vec<CashMovement>> {
        let sql = format!(
            "SELECT {} FROM cash_movements WHERE session_id = ?1 ORDER BY created_at DESC, rowid DESC",
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, CashMovement>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// `opening_float + Σ ingress − Σ egress` for a session.
    pub async fn balance(&self, session_id: &str) -> DbResult<Money> {
        let session = self.get(session_id).await?;
        let mut conn = self.pool.acquire().await?;
        let net = movement_net(&mut *conn, session_id).await?;
        Ok(session.opening_float + net)
    }

    /// Running totals for the till screen.
    pub async fn summary(&self, session_id: &str) -> DbResult<TillSummary> {
        let session = self.get(session_id).await?;
        let movements = self.movements(session_id).await?;
        Ok(TillSummary::compute(session.opening_float, &movements))
    }

    // =========================================================================
    // Close
    // =========================================================================

    /// Closes a session with the counted cash.
    ///
    /// The close flag and the expected-balance read run in one transaction.
    /// Because the close is written first, any movement that commits before
    /// it is counted and any movement that tries after it is rejected.
    ///
    /// ## Errors
    /// * `Domain(InvalidAmount)` - Negative count
    /// * `Domain(SessionClosed)` - Already closed
    /// * `NotFound` - No such session
    pub async fn close(&self, session_id: &str, counted: Money) -> DbResult<CloseReport> {
        validate_cash_count("closing_count", counted)?;

        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            r#"
            UPDATE cash_sessions
               SET closing_count = ?2, closed_at = ?3
             WHERE id = ?1 AND closing_count IS NULL
            "#,
        )
        .bind(session_id)
        .bind(counted)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if closed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.explain_not_open(session_id).await);
        }

        let opening_float: Money =
            sqlx::query_scalar("SELECT opening_float FROM cash_sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;
        let net = movement_net(&mut *tx, session_id).await?;

        tx.commit().await?;

        let report = CloseReport::new(session_id, opening_float + net, counted);
        if report.difference.is_zero() {
            info!(session_id = %session_id, expected = %report.expected, "Till closed balanced");
        } else {
            warn!(
                session_id = %session_id,
                expected = %report.expected,
                counted = %report.counted,
                difference = %report.difference,
                status = report.status.label(),
                "Till closed with discrepancy"
            );
        }
        Ok(report)
    }

    /// The close report of a closed session.
    pub async fn expected_vs_counted(&self, session_id: &str) -> DbResult<CloseReport> {
        let session = self.get(session_id).await?;
        let Some(counted) = session.closing_count else {
            return Err(DbError::Domain(CoreError::InvalidAmount {
                field: "closing_count".to_string(),
                reason: "session is still open".to_string(),
            }));
        };

        let mut conn = self.pool.acquire().await?;
        let net = movement_net(&mut *conn, session_id).await?;
        Ok(CloseReport::new(session_id, session.opening_float + net, counted))
    }

    async fn explain_not_open(&self, session_id: &str) -> DbError {
        match self.get(session_id).await {
            Ok(_) => CoreError::SessionClosed {
                session_id: session_id.to_string(),
            }
            .into(),
            Err(err) => err,
        }
    }
}

// =============================================================================
// Shared statements
// =============================================================================

/// Inserts a movement only while its session is open.
///
/// Used by manual movements and by the sale ingress written inside the
/// order transaction.
pub(crate) async fn insert_movement(
    tx: &mut Transaction<'_, Sqlite>,
    movement: &CashMovement,
) -> DbResult<()> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO cash_movements (
            id, session_id, created_at, ingress, egress, reason, document_type, order_id
        )
        SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
        WHERE EXISTS (
            SELECT 1 FROM cash_sessions WHERE id = ?2 AND closing_count IS NULL
        )
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.session_id)
    .bind(movement.created_at)
    .bind(movement.ingress)
    .bind(movement.egress)
    .bind(&movement.reason)
    .bind(movement.document_type)
    .bind(&movement.order_id)
    .execute(&mut **tx)
    .await?;

    if inserted.rows_affected() == 1 {
        debug!(movement_id = %movement.id, session_id = %movement.session_id, "Movement inserted");
        return Ok(());
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cash_sessions WHERE id = ?1)")
        .bind(&movement.session_id)
        .fetch_one(&mut **tx)
        .await?;

    if exists {
        Err(CoreError::SessionClosed {
            session_id: movement.session_id.clone(),
        }
        .into())
    } else {
        Err(DbError::not_found("CashSession", &movement.session_id))
    }
}

async fn movement_net(conn: &mut sqlx::SqliteConnection, session_id: &str) -> DbResult<Money> {
    let net: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(COALESCE(ingress, 0) - COALESCE(egress, 0)), 0)
          FROM cash_movements
         WHERE session_id = ?1
        "#,
    )
    .bind(session_id)
    .fetch_one(conn)
    .await?;
    Ok(Money::from_pesos(net))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, BRANCH_ID, COMPANY_ID};
    use caja_core::CloseStatus;

    async fn open_till(db: &crate::Database, float: i64) -> CashSession {
        db.till()
            .open(COMPANY_ID, BRANCH_ID, Money::from_pesos(float), "u-1")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_twice_fails() {
        let db = fixtures::seeded().await;
        let session = open_till(&db, 50_000).await;
        assert!(session.is_open());

        let err = db
            .till()
            .open(COMPANY_ID, BRANCH_ID, Money::from_pesos(0), "u-2")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TillAlreadyOpen { .. })));

        let current = db.till().current_session(BRANCH_ID).await.unwrap().unwrap();
        assert_eq!(current.id, session.id);
    }

    #[tokio::test]
    async fn test_concurrent_open_leaves_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::Database::new(crate::DbConfig::new(dir.path().join("caja.db")).max_connections(4))
            .await
            .unwrap();
        fixtures::seed_into(&db).await;

        let till_a = db.till();
        let till_b = db.till();
        let (first, second) = tokio::join!(
            till_a.open(COMPANY_ID, BRANCH_ID, Money::from_pesos(10_000), "u-1"),
            till_b.open(COMPANY_ID, BRANCH_ID, Money::from_pesos(20_000), "u-2"),
        );

        let mut handles = Vec::new();
        for i in 0..4 {
            let till = db.till();
            handles.push(tokio::spawn(async move {
                till.open(COMPANY_ID, BRANCH_ID, Money::zero(), &format!("u-{}", i + 3))
                    .await
            }));
        }
        let mut results = vec![first, second];
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        let opened: Vec<CashSession> = results.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
        assert_eq!(opened.len(), 1);
        for result in &results {
            if let Err(err) = result {
                assert!(
                    matches!(err, DbError::Domain(CoreError::TillAlreadyOpen { .. })),
                    "unexpected error: {err}"
                );
            }
        }

        let current = db.till().current_session(BRANCH_ID).await.unwrap().unwrap();
        assert_eq!(current.id, opened[0].id);
        assert_eq!(db.till().history(BRANCH_ID, 10).await.unwrap().len(), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_negative_float_rejected() {
        let db = fixtures::seeded().await;
        let err = db
            .till()
            .open(COMPANY_ID, BRANCH_ID, Money::from_pesos(-1), "u-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidAmount { .. })));
        assert!(db.till().current_session(BRANCH_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_with_shortfall() {
        let db = fixtures::seeded().await;
        let till = db.till();
        let session = open_till(&db, 10_000).await;

        till.record_movement(&session.id, MovementKind::Ingress, Money::from_pesos(5_000), "Venta manual")
            .await
            .unwrap();
        assert_eq!(till.balance(&session.id).await.unwrap().pesos(), 15_000);

        let report = till.close(&session.id, Money::from_pesos(14_500)).await.unwrap();
        assert_eq!(report.expected.pesos(), 15_000);
        assert_eq!(report.difference.pesos(), -500);
        assert_eq!(report.status, CloseStatus::Short);
        assert_eq!(report.status.label(), "falta");

        assert!(till.current_session(BRANCH_ID).await.unwrap().is_none());
        let again = till.expected_vs_counted(&session.id).await.unwrap();
        assert_eq!(again, report);
    }

    #[tokio::test]
    async fn test_movement_after_close_rejected() {
        let db = fixtures::seeded().await;
        let till = db.till();
        let session = open_till(&db, 1_000).await;
        till.close(&session.id, Money::from_pesos(1_000)).await.unwrap();

        let err = till
            .record_movement(&session.id, MovementKind::Egress, Money::from_pesos(100), "Retiro")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::SessionClosed { .. })));
        assert!(till.movements(&session.id).await.unwrap().is_empty());

        let err = till.close(&session.id, Money::from_pesos(0)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::SessionClosed { .. })));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let db = fixtures::seeded().await;
        let err = db
            .till()
            .record_movement("nope", MovementKind::Ingress, Money::from_pesos(1), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_movement_input() {
        let db = fixtures::seeded().await;
        let session = open_till(&db, 0).await;

        let err = db
            .till()
            .record_movement(&session.id, MovementKind::Egress, Money::from_pesos(0), "Retiro")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidAmount { .. })));

        let err = db
            .till()
            .record_movement(&session.id, MovementKind::Egress, Money::from_pesos(10), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidReason(_))));
    }

    #[tokio::test]
    async fn test_summary_matches_balance() {
        let db = fixtures::seeded().await;
        let till = db.till();
        let session = open_till(&db, 20_000).await;

        till.record_movement(&session.id, MovementKind::Ingress, Money::from_pesos(3_000), "Aporte")
            .await
            .unwrap();
        till.record_movement(&session.id, MovementKind::Egress, Money::from_pesos(1_200), "Pan")
            .await
            .unwrap();

        let summary = till.summary(&session.id).await.unwrap();
        assert_eq!(summary.total_ingress.pesos(), 3_000);
        assert_eq!(summary.total_egress.pesos(), 1_200);
        assert_eq!(summary.movement_count, 2);
        assert_eq!(summary.balance, till.balance(&session.id).await.unwrap());

        let movements = till.movements(&session.id).await.unwrap();
        assert_eq!(movements[0].reason, "Pan");
    }

    #[tokio::test]
    async fn test_movements_are_append_only() {
        let db = fixtures::seeded().await;
        let session = open_till(&db, 0).await;
        let movement = db
            .till()
            .record_movement(&session.id, MovementKind::Ingress, Money::from_pesos(10), "Aporte")
            .await
            .unwrap();

        let result = sqlx::query("DELETE FROM cash_movements WHERE id = ?1")
            .bind(&movement.id)
            .execute(db.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let db = fixtures::seeded().await;
        let first = open_till(&db, 0).await;
        db.till().close(&first.id, Money::zero()).await.unwrap();

        let second = open_till(&db, 5_000).await;
        assert_ne!(first.id, second.id);
        assert_eq!(db.till().history(BRANCH_ID, 10).await.unwrap().len(), 2);
    }
}
