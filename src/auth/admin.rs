use std::sync::Arc;

use chrono::Duration;
use session_auth_api::{CreateUserRequest, SessionResponse, SessionStatsResponse, UserResponse};
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::auth::credentials::normalize_email;
use crate::auth::ledger::AttemptLedger;
use crate::auth::password::PasswordManager;
use crate::auth::sessions::SessionManager;
use crate::db::error::RepositoryError;
use crate::db::models::user::NewUser;
use crate::db::repositories::UserStore;
use crate::error::AppError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Administrative user provisioning and session overrides.
pub struct AdminService {
    users: Arc<dyn UserStore>,
    sessions: Arc<SessionManager>,
    ledger: Arc<AttemptLedger>,
    clock: Arc<dyn Clock>,
    bcrypt_cost: u32,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<SessionManager>,
        ledger: Arc<AttemptLedger>,
        clock: Arc<dyn Clock>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            sessions,
            ledger,
            clock,
            bcrypt_cost,
        }
    }

    pub fn create_user(&self, request: &CreateUserRequest) -> Result<UserResponse, AppError> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AppError::validation("Invalid email address"));
        }
        let display_name = request.display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(AppError::validation(format!(
                "Display name must be 1 to {MAX_DISPLAY_NAME_LEN} characters"
            )));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = PasswordManager::hash(&request.password, self.bcrypt_cost)?;
        let new_user = NewUser {
            email,
            display_name: display_name.to_string(),
            password_hash,
            is_admin: request.is_admin,
            is_approved: request.is_approved,
        };

        let user = self.users.create(&new_user).map_err(|e| match e {
            RepositoryError::UniqueViolation(_) => {
                AppError::duplicate("A user with this email already exists")
            }
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User created");
        Ok(user.into())
    }

    /// Revoking approval also ends the user's session.
    pub fn set_approval(&self, user_id: Uuid, approved: bool) -> Result<UserResponse, AppError> {
        let user = self
            .users
            .set_approval(user_id, approved, self.clock.now())?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        if !approved {
            self.sessions.invalidate_all_for_user(user_id, None)?;
        }

        tracing::info!(%user_id, approved, "User approval changed");
        Ok(user.into())
    }

    pub fn list_user_sessions(&self, user_id: Uuid) -> Result<Vec<SessionResponse>, AppError> {
        Ok(self
            .sessions
            .list_user_sessions(user_id)?
            .into_iter()
            .map(|session| self.sessions.to_response(session))
            .collect())
    }

    /// Returns whether a valid session was switched off.
    pub fn invalidate_session(&self, session_id: &str) -> Result<bool, AppError> {
        Ok(self.sessions.invalidate_session(session_id)?)
    }

    pub fn invalidate_all_user_sessions(&self, user_id: Uuid) -> Result<usize, AppError> {
        Ok(self.sessions.invalidate_all_for_user(user_id, None)?)
    }

    /// Returns whether the user had a ledger record.
    pub fn clear_cooldown(&self, user_id: Uuid) -> Result<bool, AppError> {
        let cleared = self.ledger.reset(user_id)?;
        tracing::info!(%user_id, cleared, "Cooldown cleared by admin");
        Ok(cleared)
    }

    pub fn cleanup_stale_sessions(&self, inactive_minutes: Option<i64>) -> Result<usize, AppError> {
        let minutes = match inactive_minutes {
            Some(m) if m <= 0 => {
                return Err(AppError::validation("inactive_minutes must be positive"));
            }
            Some(m) => m,
            None => self.sessions.policy().inactivity_timeout.num_minutes(),
        };
        // Overflow guard for absurd inputs.
        let minutes = minutes.min(Duration::days(3650).num_minutes());

        Ok(self.sessions.cleanup_stale(minutes)?)
    }

    pub fn session_stats(&self) -> Result<SessionStatsResponse, AppError> {
        Ok(self.sessions.stats()?)
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.len() > 255 {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    }
}
