use anyhow::Result;
use chrono::Duration;
use std::env;
use std::str::FromStr;

use crate::auth::cooldown::CooldownPolicy;
use crate::auth::extractors::ClientIpSource;
use crate::auth::password::MIN_COST;
use crate::auth::sessions::SessionPolicy;
use crate::maintenance::MaintenanceSettings;
use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Détecte automatiquement l'environnement
    pub fn detect() -> Self {
        if env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
            return Self::Production;
        }

        match env::var("APP_ENV").as_deref() {
            Ok("production" | "prod") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Access tokens live shorter in production.
    fn default_jwt_expiration_hours(&self) -> i64 {
        match self {
            Self::Development => 24,
            Self::Production => 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_url: String,
    pub db_pool_size: u32,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub frontend_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub bcrypt_cost: u32,
    pub session: SessionPolicy,
    pub cooldown: CooldownPolicy,
    pub maintenance: MaintenanceSettings,
    pub rate_limit: RateLimitConfig,
    pub client_ip_source: ClientIpSource,
}

/// Reads `key` and parses it, falling back to `default` when unset or invalid.
fn env_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("⚠️  {key}={raw:?} is not valid, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    /// Charge la configuration depuis les variables d'environnement
    /// avec détection automatique de l'environnement
    pub fn from_env() -> Result<Self> {
        let environment = Environment::detect();

        tracing::info!(
            "🌍 Environment detected: {}",
            environment.as_str().to_uppercase()
        );

        Self::load_env_file(&environment);

        let database_url = Self::get_database_url(&environment)?;
        let jwt_secret = Self::get_jwt_secret(&environment)?;
        let jwt_expiration_hours = env_or(
            "JWT_EXPIRATION_HOURS",
            environment.default_jwt_expiration_hours(),
        )
        .max(1);
        let frontend_url = Self::get_frontend_url(&environment);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env_or("SERVER_PORT", 3000u16);
        let bcrypt_cost = Self::get_bcrypt_cost();

        let config = Self {
            db_pool_size: env_or("DB_POOL_SIZE", 5u32).max(1),
            session: Self::session_policy(),
            cooldown: Self::cooldown_policy(),
            maintenance: Self::maintenance_settings(),
            rate_limit: RateLimitConfig {
                login_per_minute: env_or("LOGIN_RATE_PER_MINUTE", 10u32),
                ping_per_minute: env_or("PING_RATE_PER_MINUTE", 6u32),
            },
            client_ip_source: Self::client_ip_source(),
            environment,
            database_url,
            jwt_secret,
            jwt_expiration_hours,
            frontend_url,
            server_host,
            server_port,
            bcrypt_cost,
        };

        tracing::info!("✅ Configuration loaded successfully");
        tracing::debug!("   Database: {}", Self::mask_credentials(&config.database_url));
        tracing::debug!("   Frontend: {}", config.frontend_url);
        tracing::debug!("   Server: {}:{}", config.server_host, config.server_port);
        tracing::debug!("   Session policy: {:?}", config.session);
        tracing::debug!("   Cooldown policy: {:?}", config.cooldown);
        tracing::debug!("   Client IP source: {:?}", config.client_ip_source);

        Ok(config)
    }

    /// Charge `.env` en développement; en production les variables sont injectées.
    fn load_env_file(environment: &Environment) {
        if environment.is_production() {
            tracing::info!("📦 Production mode: using injected environment variables");
            return;
        }

        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("📦 Development mode: loaded {}", path.display()),
            Err(_) => tracing::warn!("   .env file not found, using environment variables"),
        }
    }

    fn get_database_url(environment: &Environment) -> Result<String> {
        if let Ok(url) = env::var("DATABASE_URL") {
            return Ok(url);
        }

        if environment.is_production() {
            anyhow::bail!(
                "DATABASE_URL must be set in production! \
                 Configure it in Lambda environment variables."
            );
        }

        let user = env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
        let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let database = env::var("POSTGRES_DB").unwrap_or_else(|_| "session_auth".to_string());

        Ok(format!(
            "postgres://{user}:{password}@{host}:{port}/{database}"
        ))
    }

    fn get_jwt_secret(environment: &Environment) -> Result<String> {
        let secret = match env::var("JWT_SECRET") {
            Ok(s) => s,
            Err(_) if environment.is_production() => {
                tracing::error!("❌ JWT_SECRET not set in production!");
                anyhow::bail!("JWT_SECRET is required in production");
            }
            Err(_) => {
                tracing::warn!("⚠️  JWT_SECRET not set, using default (DEVELOPMENT ONLY!)");
                "dev_secret_key_change_in_production".to_string()
            }
        };

        if environment.is_production() && secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 characters in production (current: {})",
                secret.len()
            );
        }

        Ok(secret)
    }

    fn get_frontend_url(environment: &Environment) -> String {
        env::var("FRONTEND_URL").unwrap_or_else(|_| {
            if environment.is_production() {
                "https://app.example.com".to_string()
            } else {
                "http://localhost:8080".to_string()
            }
        })
    }

    fn get_bcrypt_cost() -> u32 {
        let cost = env_or("BCRYPT_COST", bcrypt::DEFAULT_COST);
        if cost < MIN_COST {
            tracing::warn!("⚠️  BCRYPT_COST={cost} is below {MIN_COST}, raising it");
            return MIN_COST;
        }
        cost.min(31)
    }

    fn session_policy() -> SessionPolicy {
        SessionPolicy {
            stale_after: Duration::hours(env_or("SESSION_STALE_HOURS", 24i64).max(1)),
            inactivity_timeout: Duration::minutes(
                env_or("SESSION_INACTIVITY_MINUTES", 30i64).max(1),
            ),
            ping_interval: Duration::minutes(env_or("SESSION_PING_INTERVAL_MINUTES", 4i64).max(1)),
        }
    }

    fn cooldown_policy() -> CooldownPolicy {
        let defaults = CooldownPolicy::default();
        let base_minutes = env_or("COOLDOWN_BASE_MINUTES", defaults.base_minutes).max(1);
        CooldownPolicy {
            threshold: env_or("LOGIN_ATTEMPT_THRESHOLD", defaults.threshold).max(1),
            base_minutes,
            max_minutes: env_or("COOLDOWN_MAX_MINUTES", defaults.max_minutes).max(base_minutes),
        }
    }

    /// Proxy headers are only trusted behind the Lambda gateway or when
    /// `TRUST_PROXY_HEADERS` says so.
    fn client_ip_source() -> ClientIpSource {
        let behind_gateway = env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok();
        if env_or("TRUST_PROXY_HEADERS", behind_gateway) {
            ClientIpSource::TrustedProxy
        } else {
            ClientIpSource::Socket
        }
    }

    fn maintenance_settings() -> MaintenanceSettings {
        let defaults = MaintenanceSettings::default();
        MaintenanceSettings {
            interval: Duration::minutes(env_or("MAINTENANCE_INTERVAL_MINUTES", 5i64).max(1)),
            attempt_retention_days: env_or("ATTEMPT_RETENTION_DAYS", defaults.attempt_retention_days)
                .max(1),
            invalid_session_retention_days: env_or(
                "INVALID_SESSION_RETENTION_DAYS",
                defaults.invalid_session_retention_days,
            )
            .max(1),
            reset_sessions_on_startup: env_or("SESSION_RESET_ON_STARTUP", false),
        }
    }

    /// Masque les credentials dans les logs
    fn mask_credentials(url: &str) -> String {
        if let Some(at_pos) = url.find('@')
            && let Some(scheme_end) = url.find("://")
        {
            let scheme = &url[..scheme_end + 3];
            let after_at = &url[at_pos..];
            return format!("{scheme}***:***{after_at}");
        }
        url.to_string()
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}
