use axum::extract::State;
use session_auth_api::UserResponse;

use crate::app::AppState;
use crate::auth::guard::CurrentUser;
use crate::error::AppError;
use crate::handlers::run_blocking;
use crate::response::AppResponse;

/// GET /users/me
/// Récupère le profil de l'utilisateur courant
pub async fn get_current_user(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<AppResponse<UserResponse>, AppError> {
    let user = run_blocking(move || state.auth.get_current_user(current.id)).await?;
    Ok(AppResponse::ok(user))
}
