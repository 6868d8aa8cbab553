//! # Auth Session
//!
//! The POS does not sign anyone in. It receives a session from the auth
//! provider and only asks it who is selling right now.

use caja_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;
use ts_rs::TS;

/// A signed-in user as handed over by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The user id, or `SESSION_EXPIRED` once `now` reaches `expires_at`.
    pub fn user_id_at(&self, now: DateTime<Utc>) -> CoreResult<&str> {
        if self.is_expired_at(now) {
            return Err(CoreError::SessionExpired);
        }
        Ok(&self.user_id)
    }
}

/// The terminal's current session, shared by every service.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    session: Arc<RwLock<Option<Session>>>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the session received from the auth provider.
    pub fn sign_in(&self, session: Session) {
        info!(user_id = %session.user_id, expires_at = %session.expires_at, "Session installed");
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn sign_out(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The user selling right now.
    ///
    /// ## Errors
    /// * `SessionExpired` - No session, or it is past its expiry
    pub fn current_user_id(&self) -> CoreResult<String> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(session) => session.user_id_at(Utc::now()).map(str::to_string),
            None => Err(CoreError::SessionExpired),
        }
    }
}
