use std::sync::Arc;

use crate::auth::password::{PasswordError, PasswordManager};
use crate::db::models::user::User;
use crate::db::repositories::UserStore;
use crate::error::AppError;

/// Canonical form of an email for lookups and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Email/password check against the stored bcrypt hash.
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    // Verified against when the email is unknown so both paths cost one bcrypt run.
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, cost: u32) -> Result<Self, PasswordError> {
        let dummy_hash = PasswordManager::hash("no-such-account", cost)?;
        Ok(Self { users, dummy_hash })
    }

    pub fn verify(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email)? else {
            let _ = PasswordManager::verify(password, &self.dummy_hash);
            tracing::debug!("Login for unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let matches = PasswordManager::verify(password, &user.password_hash).unwrap_or_else(|e| {
            tracing::error!(user_id = %user.id, "Stored password hash is unusable: {e}");
            false
        });
        if !matches {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        if !user.can_log_in() {
            return Err(AppError::AccountNotApproved);
        }

        Ok(user)
    }
}
