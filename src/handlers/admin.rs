use axum::{
    Json,
    extract::{Path, State},
};
use session_auth_api::{
    CleanupSessionsRequest, CountResponse, CreateUserRequest, MessageResponse, SessionResponse,
    SessionStatsResponse, UpdateApprovalRequest, UserResponse,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::extractors::AdminUser;
use crate::error::AppError;
use crate::handlers::run_blocking;
use crate::response::AppResponse;

/// POST /admin/users
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<AppResponse<UserResponse>, AppError> {
    tracing::info!(admin_id = %admin.id, "Admin creating user");
    let user = run_blocking(move || state.admin.create_user(&payload)).await?;
    Ok(AppResponse::created(user))
}

/// PUT /admin/users/{id}/approval
pub async fn set_approval(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateApprovalRequest>,
) -> Result<AppResponse<UserResponse>, AppError> {
    let user = run_blocking(move || state.admin.set_approval(user_id, payload.is_approved)).await?;
    Ok(AppResponse::ok(user))
}

/// GET /admin/users/{id}/sessions
pub async fn list_user_sessions(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<AppResponse<Vec<SessionResponse>>, AppError> {
    let sessions = run_blocking(move || state.admin.list_user_sessions(user_id)).await?;
    Ok(AppResponse::ok(sessions))
}

/// DELETE /admin/users/{id}/sessions
pub async fn invalidate_user_sessions(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<AppResponse<CountResponse>, AppError> {
    let count = run_blocking(move || state.admin.invalidate_all_user_sessions(user_id)).await?;
    tracing::info!(admin_id = %admin.id, %user_id, count, "Admin invalidated user sessions");
    Ok(AppResponse::ok(CountResponse::new(count as u64)))
}

/// DELETE /admin/users/{id}/cooldown
pub async fn clear_cooldown(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<AppResponse<MessageResponse>, AppError> {
    let cleared = run_blocking(move || state.admin.clear_cooldown(user_id)).await?;
    let message = if cleared {
        "Login attempts and cooldown cleared"
    } else {
        "No login attempts recorded for this user"
    };
    Ok(AppResponse::ok(MessageResponse::new(message)))
}

/// DELETE /admin/sessions/{id}
pub async fn invalidate_session(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(session_id): Path<String>,
) -> Result<AppResponse<MessageResponse>, AppError> {
    let invalidated = run_blocking(move || state.admin.invalidate_session(&session_id)).await?;
    let message = if invalidated {
        "Session invalidated"
    } else {
        "Session was not active"
    };
    Ok(AppResponse::ok(MessageResponse::new(message)))
}

/// POST /admin/sessions/cleanup
pub async fn cleanup_sessions(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(payload): Json<CleanupSessionsRequest>,
) -> Result<AppResponse<CountResponse>, AppError> {
    let count =
        run_blocking(move || state.admin.cleanup_stale_sessions(payload.inactive_minutes)).await?;
    Ok(AppResponse::ok(CountResponse::new(count as u64)))
}

/// GET /admin/sessions/stats
pub async fn session_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<AppResponse<SessionStatsResponse>, AppError> {
    let stats = run_blocking(move || state.admin.session_stats()).await?;
    Ok(AppResponse::ok(stats))
}
