use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod maintenance;
mod rate_limit;
mod response;

use app::{AppState, Stores, build_router};
use auth::clock::SystemClock;
use config::Config;
use db::repositories::{LoginAttemptRepository, SessionRepository, UserRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub async fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Si RUST_LOG n'est pas défini, utiliser ces règles par défaut
        tracing_subscriber::EnvFilter::new(
            "info,session_auth=debug,hyper_util=warn,tower_http=info",
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// ----------------- Main -----------------

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    // Initialize logging for all environments
    setup_logging().await;
    tracing::info!("Starting session-auth...");

    let config = Config::from_env()?;
    let pool = db::connection::create_pool(&config.database_url, config.db_pool_size)?;

    let stores = Stores {
        users: Arc::new(UserRepository::new(pool.clone())),
        sessions: Arc::new(SessionRepository::new(pool.clone())),
        attempts: Arc::new(LoginAttemptRepository::new(pool)),
    };
    let state = AppState::new(&config, stores, Arc::new(SystemClock))?;

    let maintenance = Arc::new(state.maintenance(&config));
    let recovery = Arc::clone(&maintenance);
    tokio::task::spawn_blocking(move || recovery.startup_recovery()).await?;

    let limiters = state.limiters();
    let app = build_router(state, &config.frontend_url);

    if env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
        tracing::info!("Running in Lambda mode");
        lambda_http::run(app).await
    } else {
        tracing::info!("Running in local HTTP server mode");
        let _maintenance_task = maintenance.spawn(limiters);

        let addr = format!("{}:{}", config.server_host, config.server_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("🚀 Server running at http://{}", addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }
}
