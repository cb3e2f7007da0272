use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use session_auth_api::{SessionResponse, SessionStatsResponse};
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::auth::device::DeviceIdentity;
use crate::db::error::RepositoryError;
use crate::db::models::session::{NewSession, Session};
use crate::db::repositories::SessionStore;
use crate::error::AppError;

const SESSION_ID_BYTES: usize = 32;

/// Time thresholds that govern a session's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// A valid session idle for longer can be taken over by another device.
    pub stale_after: Duration,
    /// Default idle time after which the cleanup job invalidates a session.
    pub inactivity_timeout: Duration,
    /// Minimum spacing between two accepted keep-alive pings.
    pub ping_interval: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::hours(24),
            inactivity_timeout: Duration::minutes(30),
            ping_interval: Duration::minutes(4),
        }
    }
}

pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The single authoritative session of each user.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, policy: SessionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_stale(&self, session: &Session) -> bool {
        session.is_stale(self.clock.now(), self.policy.stale_after)
    }

    /// Replaces whatever valid session the user had with a fresh one.
    pub fn create_session(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
        device: &DeviceIdentity,
    ) -> Result<Session, RepositoryError> {
        let now = self.clock.now();
        let new_session = NewSession {
            id: generate_session_id(),
            user_id,
            valid: true,
            created_at: now,
            last_activity: Some(now),
            ip_address: Some(ip_address.to_string()),
            user_agent: Some(user_agent.to_string()),
            device_fingerprint: Some(device.fingerprint.clone()),
            owner_label: Some(device.owner_label.clone()),
        };

        let session = self.store.create(&new_session)?;
        tracing::info!(%user_id, session_id = %session.id, "Session created");
        Ok(session)
    }

    /// The user's valid session, stale or not.
    pub fn find_valid_session(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError> {
        self.store.find_valid_for_user(user_id)
    }

    /// The user's most recent session, valid or not.
    pub fn find_latest_session(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError> {
        self.store.find_latest_for_user(user_id)
    }

    /// The user's valid session if it has been seen recently enough.
    pub fn get_active_session(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError> {
        Ok(self
            .store
            .find_valid_for_user(user_id)?
            .filter(|session| !self.is_stale(session)))
    }

    /// Checks that `session_id` is the valid session of `user_id`. With
    /// `touch`, a successful check also records activity.
    pub fn validate_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        touch: bool,
    ) -> Result<Session, AppError> {
        let session = self
            .store
            .find(session_id)?
            .filter(|session| session.user_id == user_id)
            .ok_or(AppError::SessionNotFound)?;

        if !session.valid {
            return Err(AppError::SessionInvalidated);
        }

        if touch && !self.store.touch(session_id, self.clock.now())? {
            // Invalidated between the read and the touch.
            return Err(AppError::SessionInvalidated);
        }

        Ok(session)
    }

    pub fn invalidate_session(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let invalidated = self.store.invalidate(session_id)?;
        if invalidated {
            tracing::info!(%session_id, "Session invalidated");
        }
        Ok(invalidated)
    }

    pub fn invalidate_all_for_user(
        &self,
        user_id: Uuid,
        except_session_id: Option<&str>,
    ) -> Result<usize, RepositoryError> {
        let count = self.store.invalidate_all_for_user(user_id, except_session_id)?;
        if count > 0 {
            tracing::info!(%user_id, count, "User sessions invalidated");
        }
        Ok(count)
    }

    /// Keep-alive; accepted at most once per ping interval.
    pub fn touch_activity(&self, session_id: &str) -> Result<(), AppError> {
        let now = self.clock.now();
        let idle_cutoff = now - self.policy.ping_interval;

        if self.store.touch_if_idle_since(session_id, now, idle_cutoff)? {
            return Ok(());
        }

        let session = self
            .store
            .find(session_id)?
            .ok_or(AppError::SessionNotFound)?;
        if !session.valid {
            return Err(AppError::SessionInvalidated);
        }

        let next_allowed = session.last_seen() + self.policy.ping_interval;
        Err(AppError::PingThrottled {
            retry_after_seconds: (next_allowed - now).num_seconds().max(1),
        })
    }

    /// Invalidates valid sessions idle for more than `inactivity_minutes`.
    pub fn cleanup_stale(&self, inactivity_minutes: i64) -> Result<usize, RepositoryError> {
        let cutoff = self.clock.now() - Duration::minutes(inactivity_minutes);
        let count = self.store.invalidate_inactive_since(cutoff)?;
        if count > 0 {
            tracing::info!(count, inactivity_minutes, "Inactive sessions invalidated");
        }
        Ok(count)
    }

    pub fn cleanup_inactive(&self) -> Result<usize, RepositoryError> {
        self.cleanup_stale(self.policy.inactivity_timeout.num_minutes())
    }

    pub fn list_user_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, RepositoryError> {
        self.store.list_for_user(user_id)
    }

    pub fn stats(&self) -> Result<SessionStatsResponse, RepositoryError> {
        let stats = self.store.stats()?;
        Ok(SessionStatsResponse {
            total_sessions: stats.total_sessions,
            active_sessions: stats.active_sessions,
            distinct_users: stats.distinct_users,
            users_with_active_session: stats.users_with_active_session,
        })
    }

    /// Hard-deletes sessions that have been invalid for `retention_days`.
    pub fn purge_invalid(&self, retention_days: i64) -> Result<usize, RepositoryError> {
        let cutoff = self.clock.now() - Duration::days(retention_days);
        self.store.purge_invalid_before(cutoff)
    }

    pub fn invalidate_all_valid(&self) -> Result<usize, RepositoryError> {
        self.store.invalidate_all_valid()
    }

    pub fn reconcile_login_flags(&self) -> Result<usize, RepositoryError> {
        self.store.reconcile_login_flags()
    }

    pub fn to_response(&self, session: Session) -> SessionResponse {
        let stale = session.valid && self.is_stale(&session);
        SessionResponse {
            id: session.id,
            user_id: session.user_id,
            valid: session.valid,
            stale,
            created_at: session.created_at,
            last_activity: session.last_activity,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            device_fingerprint: session.device_fingerprint,
            owner_label: session.owner_label,
        }
    }
}
