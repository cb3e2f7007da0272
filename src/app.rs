// src/app.rs

use axum::{
    Extension, Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::admin::AdminService;
use crate::auth::clock::Clock;
use crate::auth::credentials::CredentialVerifier;
use crate::auth::extractors::ClientIpSource;
use crate::auth::guard::SessionGuard;
use crate::auth::jwt::JwtManager;
use crate::auth::ledger::AttemptLedger;
use crate::auth::services::AuthService;
use crate::auth::sessions::SessionManager;
use crate::config::Config;
use crate::db::repositories::{LoginAttemptStore, SessionStore, UserStore};
use crate::handlers::admin::{
    cleanup_sessions, clear_cooldown, create_user, invalidate_session, invalidate_user_sessions,
    list_user_sessions, session_stats, set_approval,
};
use crate::handlers::auth::{login, logout, session_ping, session_status};
use crate::handlers::health::health;
use crate::handlers::user::get_current_user;
use crate::maintenance::Maintenance;
use crate::rate_limit::{IpRateLimiter, limit_by_ip};

/// Storage backends the services run on.
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub attempts: Arc<dyn LoginAttemptStore>,
}

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub admin: Arc<AdminService>,
    pub guard: Arc<SessionGuard>,
    pub sessions: Arc<SessionManager>,
    pub ledger: Arc<AttemptLedger>,
    pub login_limiter: IpRateLimiter,
    pub ping_limiter: IpRateLimiter,
    pub client_ip_source: ClientIpSource,
}

impl FromRef<AppState> for Arc<SessionGuard> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.guard)
    }
}

impl AppState {
    pub fn new(config: &Config, stores: Stores, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiration_hours);

        let sessions = Arc::new(SessionManager::new(
            stores.sessions,
            config.session,
            Arc::clone(&clock),
        ));
        let ledger = Arc::new(AttemptLedger::new(
            stores.attempts,
            config.cooldown,
            Arc::clone(&clock),
        ));
        let verifier = CredentialVerifier::new(Arc::clone(&stores.users), config.bcrypt_cost)?;

        let auth = AuthService::new(
            verifier,
            Arc::clone(&stores.users),
            Arc::clone(&sessions),
            Arc::clone(&ledger),
            jwt.clone(),
        );
        let admin = AdminService::new(
            Arc::clone(&stores.users),
            Arc::clone(&sessions),
            Arc::clone(&ledger),
            clock,
            config.bcrypt_cost,
        );
        let guard = SessionGuard::new(jwt, stores.users, Arc::clone(&sessions));

        Ok(Self {
            auth: Arc::new(auth),
            admin: Arc::new(admin),
            guard: Arc::new(guard),
            sessions,
            ledger,
            login_limiter: IpRateLimiter::per_minute("login", config.rate_limit.login_per_minute),
            ping_limiter: IpRateLimiter::per_minute("session-ping", config.rate_limit.ping_per_minute),
            client_ip_source: config.client_ip_source,
        })
    }

    pub fn maintenance(&self, config: &Config) -> Maintenance {
        Maintenance::new(
            Arc::clone(&self.sessions),
            Arc::clone(&self.ledger),
            config.maintenance,
        )
    }

    pub fn limiters(&self) -> Vec<IpRateLimiter> {
        vec![self.login_limiter.clone(), self.ping_limiter.clone()]
    }
}

/// Configure les routes d'authentification
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            post(login).layer(middleware::from_fn_with_state(
                state.login_limiter.clone(),
                limit_by_ip,
            )),
        )
        .route("/session-status", get(session_status))
        .route("/logout", post(logout))
        .route(
            "/session-ping",
            post(session_ping).layer(middleware::from_fn_with_state(
                state.ping_limiter.clone(),
                limit_by_ip,
            )),
        )
}

/// Configure les routes utilisateur
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}/approval", put(set_approval))
        .route(
            "/users/{id}/sessions",
            get(list_user_sessions).delete(invalidate_user_sessions),
        )
        .route("/users/{id}/cooldown", delete(clear_cooldown))
        .route("/sessions/{id}", delete(invalidate_session))
        .route("/sessions/cleanup", post(cleanup_sessions))
        .route("/sessions/stats", get(session_stats))
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!("⚠️  FRONTEND_URL {frontend_url:?} is not a valid origin, CORS disabled");
            layer
        }
    }
}

/// Construit l'application complète
pub fn build_router(state: AppState, frontend_url: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes(&state))
        .nest("/users", user_routes())
        .nest("/admin", admin_routes())
        .layer(Extension(state.client_ip_source))
        .layer(cors_layer(frontend_url))
        // Middleware global de tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
