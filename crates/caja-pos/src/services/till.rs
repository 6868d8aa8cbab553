//! # Till Service
//!
//! Open, move and close the branch's caja from the terminal.

use caja_core::{
    CashMovement, CashSession, CloseReport, Money, MovementKind, TillSummary,
};
use caja_db::Database;
use tracing::debug;

use crate::auth::AuthState;
use crate::config::TerminalConfig;
use crate::error::{ApiError, ApiResult};

/// How many past sessions the history screen shows.
const HISTORY_LIMIT: i64 = 30;

#[derive(Clone)]
pub struct TillService {
    db: Database,
    auth: AuthState,
    terminal: TerminalConfig,
}

impl TillService {
    pub fn new(db: Database, auth: AuthState, terminal: TerminalConfig) -> Self {
        TillService { db, auth, terminal }
    }

    /// Opens the branch's till with `opening_float` in the drawer.
    ///
    /// ## Errors
    /// * `INVALID_AMOUNT` - Negative float
    /// * `ALREADY_OPEN` - A session is already open, even one from a
    ///   previous day; it must be closed first
    pub async fn open(&self, opening_float: Money) -> ApiResult<CashSession> {
        let user_id = self.auth.current_user_id()?;
        let session = self
            .db
            .till()
            .open(
                &self.terminal.company_id,
                &self.terminal.branch_id,
                opening_float,
                &user_id,
            )
            .await?;
        Ok(session)
    }

    /// The branch's open session, if any.
    pub async fn current(&self) -> ApiResult<Option<CashSession>> {
        Ok(self.db.till().current_session(&self.terminal.branch_id).await?)
    }

    /// Records a manual ingress or egress on the open session.
    ///
    /// ## Errors
    /// * `TILL_CLOSED` - Nothing is open
    /// * `INVALID_AMOUNT` / `INVALID_REASON`
    /// * `SESSION_CLOSED` - The session was closed concurrently
    pub async fn record(&self, kind: MovementKind, amount: Money, reason: &str) -> ApiResult<CashMovement> {
        let session = self.db.till().require_open(&self.terminal.branch_id).await?;
        debug!(session_id = %session.id, ?kind, amount = %amount, "Recording manual movement");

        let movement = self
            .db
            .till()
            .record_movement(&session.id, kind, amount, reason)
            .await?;
        Ok(movement)
    }

    /// Closes the open session with the cash actually counted.
    pub async fn close(&self, counted: Money) -> ApiResult<CloseReport> {
        let session = self.db.till().require_open(&self.terminal.branch_id).await?;
        Ok(self.db.till().close(&session.id, counted).await?)
    }

    /// Running totals of the open session.
    pub async fn summary(&self) -> ApiResult<TillSummary> {
        let session = self.db.till().require_open(&self.terminal.branch_id).await?;
        Ok(self.db.till().summary(&session.id).await?)
    }

    /// Movements of a session, newest first.
    pub async fn movements(&self, session_id: &str) -> ApiResult<Vec<CashMovement>> {
        self.ensure_own_branch(session_id).await?;
        Ok(self.db.till().movements(session_id).await?)
    }

    /// Close report of an already closed session.
    pub async fn report(&self, session_id: &str) -> ApiResult<CloseReport> {
        self.ensure_own_branch(session_id).await?;
        Ok(self.db.till().expected_vs_counted(session_id).await?)
    }

    pub async fn history(&self) -> ApiResult<Vec<CashSession>> {
        Ok(self
            .db
            .till()
            .history(&self.terminal.branch_id, HISTORY_LIMIT)
            .await?)
    }

    async fn ensure_own_branch(&self, session_id: &str) -> ApiResult<()> {
        let session = self.db.till().get(session_id).await?;
        if session.branch_id != self.terminal.branch_id {
            return Err(ApiError::not_found("CashSession", session_id));
        }
        Ok(())
    }
}
