use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::auth::cooldown::CooldownPolicy;
use crate::db::error::RepositoryError;
use crate::db::repositories::LoginAttemptStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CooldownStatus {
    pub in_cooldown: bool,
    pub remaining_seconds: i64,
    pub attempt_count: i32,
}

impl CooldownStatus {
    /// Remaining time rounded up, so "0 minutes" is never shown while blocked.
    pub fn remaining_minutes(&self) -> i64 {
        (self.remaining_seconds + 59) / 60
    }
}

/// Per-user count of logins denied because another device holds the session.
pub struct AttemptLedger {
    store: Arc<dyn LoginAttemptStore>,
    policy: CooldownPolicy,
    clock: Arc<dyn Clock>,
}

impl AttemptLedger {
    pub fn new(
        store: Arc<dyn LoginAttemptStore>,
        policy: CooldownPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    pub fn check_cooldown(&self, user_id: Uuid) -> Result<CooldownStatus, RepositoryError> {
        let Some(record) = self.store.find(user_id)? else {
            return Ok(CooldownStatus::default());
        };

        let now = self.clock.now();
        let remaining_seconds = record
            .cooldown_until
            .filter(|until| *until > now)
            .map_or(0, |until| (until - now).num_seconds().max(1));

        Ok(CooldownStatus {
            in_cooldown: remaining_seconds > 0,
            remaining_seconds,
            attempt_count: record.attempt_count,
        })
    }

    /// Returns the attempt count after this denial.
    pub fn record_denial(&self, user_id: Uuid) -> Result<i32, RepositoryError> {
        self.store.increment(user_id, self.clock.now())
    }

    /// Persists a cooldown once `attempt_count` reached the threshold and
    /// returns its length in minutes.
    pub fn apply_cooldown_if_threshold(
        &self,
        user_id: Uuid,
        attempt_count: i32,
    ) -> Result<Option<i64>, RepositoryError> {
        let Some(minutes) = self.policy.cooldown_minutes(attempt_count) else {
            return Ok(None);
        };

        let until = self.clock.now() + Duration::minutes(minutes);
        self.store.set_cooldown(user_id, until)?;
        tracing::warn!(%user_id, attempt_count, minutes, "Login cooldown applied");

        Ok(Some(minutes))
    }

    pub fn reset(&self, user_id: Uuid) -> Result<bool, RepositoryError> {
        self.store.delete(user_id)
    }

    pub fn cleanup_old(&self, max_age_days: i64) -> Result<usize, RepositoryError> {
        let cutoff = self.clock.now() - Duration::days(max_age_days);
        self.store.delete_idle_before(cutoff)
    }
}
