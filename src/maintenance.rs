//! Startup recovery and the periodic cleanup loop.
//!
//! Every step is best effort: a failure (typically a table that is not
//! migrated yet) is logged and the remaining steps still run.

use std::sync::Arc;

use chrono::Duration;
use tokio::task::JoinHandle;

use crate::auth::ledger::AttemptLedger;
use crate::auth::sessions::SessionManager;
use crate::db::error::RepositoryError;
use crate::rate_limit::IpRateLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSettings {
    pub interval: Duration,
    pub attempt_retention_days: i64,
    pub invalid_session_retention_days: i64,
    /// Invalidate every valid session when the service starts.
    pub reset_sessions_on_startup: bool,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            interval: Duration::minutes(5),
            attempt_retention_days: 30,
            invalid_session_retention_days: 90,
            reset_sessions_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub stale_sessions: usize,
    pub reset_sessions: usize,
    pub corrected_flags: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub stale_sessions: usize,
    pub purged_sessions: usize,
    pub purged_attempts: usize,
}

fn best_effort(step: &str, result: Result<usize, RepositoryError>) -> usize {
    match result {
        Ok(count) => count,
        Err(e) if e.is_missing_relation() => {
            tracing::warn!(step, "⚠️  Skipped, table not migrated yet: {e}");
            0
        }
        Err(e) => {
            tracing::warn!(step, "⚠️  Failed: {e}");
            0
        }
    }
}

pub struct Maintenance {
    sessions: Arc<SessionManager>,
    ledger: Arc<AttemptLedger>,
    settings: MaintenanceSettings,
}

impl Maintenance {
    pub fn new(
        sessions: Arc<SessionManager>,
        ledger: Arc<AttemptLedger>,
        settings: MaintenanceSettings,
    ) -> Self {
        Self {
            sessions,
            ledger,
            settings,
        }
    }

    /// Brings session state back in line after a crash or restart.
    pub fn startup_recovery(&self) -> StartupReport {
        let stale_sessions = best_effort("stale session cleanup", self.sessions.cleanup_inactive());

        let reset_sessions = if self.settings.reset_sessions_on_startup {
            best_effort("session reset", self.sessions.invalidate_all_valid())
        } else {
            0
        };

        let corrected_flags = best_effort(
            "login flag reconciliation",
            self.sessions.reconcile_login_flags(),
        );

        let report = StartupReport {
            stale_sessions,
            reset_sessions,
            corrected_flags,
        };
        tracing::info!(?report, "🔧 Startup recovery done");
        report
    }

    pub fn run_once(&self) -> MaintenanceReport {
        let report = MaintenanceReport {
            stale_sessions: best_effort("stale session cleanup", self.sessions.cleanup_inactive()),
            purged_sessions: best_effort(
                "invalid session purge",
                self.sessions
                    .purge_invalid(self.settings.invalid_session_retention_days),
            ),
            purged_attempts: best_effort(
                "attempt ledger purge",
                self.ledger.cleanup_old(self.settings.attempt_retention_days),
            ),
        };

        if report != MaintenanceReport::default() {
            tracing::info!(?report, "Maintenance pass");
        }
        report
    }

    /// Runs [`Self::run_once`] every `interval` until the runtime shuts down.
    pub fn spawn(self: Arc<Self>, limiters: Vec<IpRateLimiter>) -> JoinHandle<()> {
        let period = self
            .settings
            .interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(300));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; startup recovery already covered it.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let maintenance = Arc::clone(&self);
                if let Err(e) = tokio::task::spawn_blocking(move || maintenance.run_once()).await {
                    tracing::error!("Maintenance pass panicked: {e}");
                }
                for limiter in &limiters {
                    limiter.retain_recent();
                }
            }
        })
    }
}
