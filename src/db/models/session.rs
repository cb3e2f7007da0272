use crate::db::schema::sessions;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub id: String,
    pub user_id: Uuid,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
    pub owner_label: Option<String>,
}

// Field order follows the `sessions` table so `get_result` maps RETURNING *.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
    pub owner_label: Option<String>,
}

impl Session {
    /// Last moment the owning client was seen; falls back to creation time.
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_activity.unwrap_or(self.created_at)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        now - self.last_seen() > threshold
    }

    pub fn belongs_to_device(&self, fingerprint: &str) -> bool {
        self.device_fingerprint.as_deref() == Some(fingerprint)
    }
}

/// Aggregate counters over the sessions table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub distinct_users: i64,
    pub users_with_active_session: i64,
}
