use crate::db::schema::login_attempts;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = login_attempts)]
pub struct NewLoginAttempt {
    pub user_id: Uuid,
    pub attempt_count: i32,
    pub last_attempt_at: DateTime<Utc>,
}

/// Denied-login ledger row: one per user with an active-session conflict.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = login_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LoginAttempt {
    pub user_id: Uuid,
    pub attempt_count: i32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_attempt_at: DateTime<Utc>,
}
