//! Progressive penalty for repeated logins against a session held elsewhere.
//!
//! Denials below `threshold` are only counted. From the threshold on, each
//! denial sets a cooldown of `base_minutes * 2^(count - threshold)`, capped at
//! `max_minutes`: with the defaults 15, 30, 60, 120, 240, 240, ... minutes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub threshold: i32,
    pub base_minutes: i64,
    pub max_minutes: i64,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            base_minutes: 15,
            max_minutes: 240,
        }
    }
}

impl CooldownPolicy {
    /// Cooldown length for a ledger that just reached `attempt_count` denials.
    pub fn cooldown_minutes(&self, attempt_count: i32) -> Option<i64> {
        if attempt_count < self.threshold {
            return None;
        }

        let breaches = attempt_count - self.threshold;
        let mut minutes = self.base_minutes;
        for _ in 0..breaches {
            if minutes >= self.max_minutes {
                break;
            }
            minutes = minutes.saturating_mul(2);
        }
        Some(minutes.min(self.max_minutes))
    }

    pub fn attempts_remaining(&self, attempt_count: i32) -> i64 {
        i64::from((self.threshold - attempt_count).max(0))
    }
}
