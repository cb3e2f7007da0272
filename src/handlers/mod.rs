pub mod admin;
pub mod auth;
pub mod health;
pub mod user;

use crate::error::AppError;

/// Runs blocking store work (diesel, bcrypt) off the async executor.
pub async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("Blocking task failed: {e}")))?
}
