// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use session_auth_api::{ErrorFlags, ErrorResponse};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    // === Erreurs Repository ===
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Duplicate(String),
    #[error("Database error: {0}")]
    DatabaseError(String),

    // === Login ===
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account not approved")]
    AccountNotApproved,
    #[error("Login cooldown active for {remaining_minutes} more minutes")]
    CooldownActive { remaining_minutes: i64 },
    #[error("Session active on another device")]
    SessionActiveElsewhere {
        attempts_remaining: i64,
        cooldown_minutes: Option<i64>,
    },

    // === Session / credential state ===
    #[error("Session not found")]
    SessionNotFound,
    #[error("Session invalidated")]
    SessionInvalidated,
    #[error("Credential expired")]
    CredentialExpired,
    #[error("Credential invalid")]
    CredentialInvalid,
    #[error("Invalid token format")]
    InvalidTokenFormat,
    #[error("User not found")]
    UserNotFound,
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // === Throttling ===
    #[error("Session ping throttled for {retry_after_seconds}s")]
    PingThrottled { retry_after_seconds: i64 },
    #[error("Rate limit exceeded")]
    RateLimited,

    // === Erreurs de Hashing/Cryptographie ===
    #[error("Password hashing failed: {0}")]
    PasswordHashingFailed(String),
    #[error("Token generation failed: {0}")]
    TokenGenerationFailed(String),

    // === Erreurs de Validation ===
    #[error("Validation error: {0}")]
    ValidationError(String),

    // === Erreurs internes ===
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

/// Everything needed to render an [`AppError`] as an HTTP response.
struct ErrorInfo {
    status: StatusCode,
    code: &'static str,
    message: String,
    flags: ErrorFlags,
    internal_detail: Option<String>,
}

impl ErrorInfo {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            flags: ErrorFlags::default(),
            internal_detail: None,
        }
    }

    fn flags(mut self, flags: ErrorFlags) -> Self {
        self.flags = flags;
        self
    }

    fn requires_login(self) -> Self {
        self.flags(ErrorFlags {
            requires_login: true,
            ..ErrorFlags::default()
        })
    }

    fn internal(mut self, detail: &str) -> Self {
        self.internal_detail = Some(detail.to_string());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let info = self.error_info();

        if let Some(ref detail) = info.internal_detail {
            tracing::error!(error_code = info.code, status = %info.status, detail, "Internal server error");
        }

        let body = Json(ErrorResponse::new(info.code, info.message).with_flags(info.flags));

        (info.status, body).into_response()
    }
}

impl AppError {
    fn error_info(&self) -> ErrorInfo {
        match self {
            // 404 Not Found
            AppError::NotFound(msg) => ErrorInfo::new(StatusCode::NOT_FOUND, "NOT_FOUND", msg),

            // 409 Conflict
            AppError::Duplicate(msg) => {
                ErrorInfo::new(StatusCode::CONFLICT, "DUPLICATE_ENTRY", msg)
            }
            AppError::SessionActiveElsewhere {
                attempts_remaining,
                cooldown_minutes,
            } => {
                let message = match cooldown_minutes {
                    Some(minutes) => format!(
                        "This account is already logged in on another device. \
                         Login is blocked for {minutes} minutes."
                    ),
                    None => format!(
                        "This account is already logged in on another device. \
                         {attempts_remaining} attempt(s) remaining before a cooldown."
                    ),
                };
                ErrorInfo::new(StatusCode::CONFLICT, "SESSION_ACTIVE_ELSEWHERE", message).flags(
                    ErrorFlags {
                        already_logged_in: true,
                        attempts_remaining: Some(*attempts_remaining),
                        cooldown_minutes: *cooldown_minutes,
                        ..ErrorFlags::default()
                    },
                )
            }

            // 401 Unauthorized
            AppError::InvalidCredentials => ErrorInfo::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid email or password",
            ),
            AppError::SessionInvalidated => ErrorInfo::new(
                StatusCode::UNAUTHORIZED,
                "SESSION_INVALIDATED",
                "You have been logged in from another device",
            )
            .flags(ErrorFlags {
                logged_in_elsewhere: true,
                requires_login: true,
                ..ErrorFlags::default()
            }),
            AppError::SessionNotFound => ErrorInfo::new(
                StatusCode::UNAUTHORIZED,
                "SESSION_NOT_FOUND",
                "Session not found, please log in again",
            )
            .requires_login(),
            AppError::CredentialExpired => ErrorInfo::new(
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Your session has expired, please log in again",
            )
            .requires_login(),
            AppError::CredentialInvalid => {
                ErrorInfo::new(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "Invalid token")
                    .requires_login()
            }
            AppError::InvalidTokenFormat => ErrorInfo::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN_FORMAT",
                "Missing or malformed bearer token",
            )
            .requires_login(),
            AppError::UserNotFound => {
                ErrorInfo::new(StatusCode::UNAUTHORIZED, "USER_NOT_FOUND", "User not found")
                    .requires_login()
            }

            // 403 Forbidden
            AppError::AccountNotApproved => ErrorInfo::new(
                StatusCode::FORBIDDEN,
                "ACCOUNT_NOT_APPROVED",
                "Your account has not been approved yet",
            ),
            AppError::Forbidden(msg) => ErrorInfo::new(StatusCode::FORBIDDEN, "FORBIDDEN", msg),

            // 400 Bad Request
            AppError::ValidationError(msg) => {
                ErrorInfo::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }

            // 429 Too Many Requests
            AppError::CooldownActive { remaining_minutes } => ErrorInfo::new(
                StatusCode::TOO_MANY_REQUESTS,
                "COOLDOWN_ACTIVE",
                format!("Too many login attempts. Try again in {remaining_minutes} minutes."),
            )
            .flags(ErrorFlags {
                cooldown_minutes: Some(*remaining_minutes),
                ..ErrorFlags::default()
            }),
            AppError::PingThrottled {
                retry_after_seconds,
            } => ErrorInfo::new(
                StatusCode::TOO_MANY_REQUESTS,
                "PING_THROTTLED",
                "Session activity was refreshed recently",
            )
            .flags(ErrorFlags {
                retry_after_seconds: Some(*retry_after_seconds),
                ..ErrorFlags::default()
            }),
            AppError::RateLimited => ErrorInfo::new(
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests, slow down",
            ),

            // 500 Internal Server Error
            AppError::PasswordHashingFailed(msg) => ErrorInfo::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "HASHING_ERROR",
                "An error occurred while processing your request",
            )
            .internal(msg),
            AppError::TokenGenerationFailed(msg) => ErrorInfo::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_ERROR",
                "An error occurred while generating token",
            )
            .internal(msg),
            AppError::DatabaseError(msg) => ErrorInfo::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An error occurred with the database",
            )
            .internal(msg),
            AppError::InternalServerError(msg) => ErrorInfo::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred",
            )
            .internal(msg),
        }
    }

    // === Constructeurs helpers ===
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        AppError::Duplicate(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        AppError::DatabaseError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::InternalServerError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    /// Retourne le code de statut HTTP
    pub fn status_code(&self) -> StatusCode {
        self.error_info().status
    }
}

// === Conversions automatiques depuis d'autres types d'erreurs ===

impl From<crate::db::error::RepositoryError> for AppError {
    fn from(err: crate::db::error::RepositoryError) -> Self {
        use crate::db::error::RepositoryError;

        match err {
            RepositoryError::NotFound(msg) => AppError::not_found(msg),
            RepositoryError::UniqueViolation(msg) => AppError::duplicate(msg),
            RepositoryError::PoolError(msg)
            | RepositoryError::ForeignKeyViolation(msg)
            | RepositoryError::DatabaseError(msg) => AppError::database(msg),
        }
    }
}

impl From<crate::auth::jwt::JwtError> for AppError {
    fn from(err: crate::auth::jwt::JwtError) -> Self {
        use crate::auth::jwt::JwtError;

        match err {
            JwtError::GenerationFailed(e) => AppError::TokenGenerationFailed(e.to_string()),
            JwtError::Expired => AppError::CredentialExpired,
            JwtError::Invalid(_) => AppError::CredentialInvalid,
        }
    }
}

impl From<crate::auth::password::PasswordError> for AppError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        AppError::PasswordHashingFailed(err.to_string())
    }
}
