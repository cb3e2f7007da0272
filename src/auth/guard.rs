use std::sync::Arc;

use uuid::Uuid;

use crate::auth::jwt::JwtManager;
use crate::auth::sessions::SessionManager;
use crate::db::repositories::UserStore;
use crate::error::AppError;

/// The authenticated caller, resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub is_approved: bool,
    pub session_id: String,
}

/// Validates access tokens against the user table and the session store.
pub struct SessionGuard {
    jwt: JwtManager,
    users: Arc<dyn UserStore>,
    sessions: Arc<SessionManager>,
}

impl SessionGuard {
    pub fn new(jwt: JwtManager, users: Arc<dyn UserStore>, sessions: Arc<SessionManager>) -> Self {
        Self {
            jwt,
            users,
            sessions,
        }
    }

    /// Resolves `token` to its user and session. `touch` records activity on
    /// the session; status, ping and logout pass `false`.
    pub fn authenticate(&self, token: &str, touch: bool) -> Result<CurrentUser, AppError> {
        let claims = self.jwt.verify_token(token)?;

        let user = self
            .users
            .find_by_id(claims.sub)?
            .ok_or(AppError::UserNotFound)?;

        if !user.can_log_in() {
            return Err(AppError::AccountNotApproved);
        }

        let session = self
            .sessions
            .validate_session(&claims.session_id, user.id, touch)
            .inspect_err(|e| {
                tracing::debug!(user_id = %user.id, session_id = %claims.session_id, "Rejected session: {e}");
            })?;

        Ok(CurrentUser {
            id: user.id,
            email: user.email,
            is_admin: user.is_admin,
            is_approved: user.is_approved,
            session_id: session.id,
        })
    }
}
