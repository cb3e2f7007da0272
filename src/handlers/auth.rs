// src/handlers/auth.rs

use axum::{Json, extract::State};
use session_auth_api::{LoginRequest, LoginResponse, MessageResponse, SessionStatusResponse};

use crate::app::AppState;
use crate::auth::extractors::{BearerToken, ClientContext, PassiveSession};
use crate::auth::services::LoginOrigin;
use crate::error::AppError;
use crate::handlers::run_blocking;
use crate::response::AppResponse;

/// POST /auth/login
/// Connexion d'un utilisateur (une seule session active par compte)
pub async fn login(
    State(state): State<AppState>,
    client: ClientContext,
    Json(payload): Json<LoginRequest>,
) -> Result<AppResponse<LoginResponse>, AppError> {
    let response = run_blocking(move || {
        state.auth.login(
            &payload,
            LoginOrigin {
                ip: &client.ip,
                user_agent: &client.user_agent,
            },
        )
    })
    .await?;

    Ok(AppResponse::ok(response))
}

/// GET /auth/session-status
pub async fn session_status(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<AppResponse<SessionStatusResponse>, AppError> {
    let status = run_blocking(move || state.auth.session_status(&token)).await?;
    Ok(AppResponse::ok(status))
}

/// POST /auth/logout
/// Déconnexion: invalide la session et remet à zéro les tentatives
pub async fn logout(
    State(state): State<AppState>,
    PassiveSession(current): PassiveSession,
) -> Result<AppResponse<MessageResponse>, AppError> {
    run_blocking(move || state.auth.logout(&current)).await?;
    Ok(AppResponse::ok(MessageResponse::new("Logged out successfully")))
}

/// POST /auth/session-ping
/// Keep-alive, accepted once per ping interval
pub async fn session_ping(
    State(state): State<AppState>,
    PassiveSession(current): PassiveSession,
) -> Result<AppResponse<MessageResponse>, AppError> {
    run_blocking(move || state.auth.ping(&current)).await?;
    Ok(AppResponse::ok(MessageResponse::new("Session activity recorded")))
}
