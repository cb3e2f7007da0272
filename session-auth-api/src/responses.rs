use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub access_token: String,
    pub user: UserResponse,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionStatusResponse {
    pub session_valid: bool,
    /// The token was valid but its session has been displaced.
    pub logged_in_elsewhere: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Admin view of a session row.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionResponse {
    pub id: String,
    pub user_id: Uuid,
    pub valid: bool,
    pub stale: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
    pub owner_label: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatsResponse {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub distinct_users: i64,
    pub users_with_active_session: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CountResponse {
    pub success: bool,
    pub count: u64,
}

impl CountResponse {
    pub fn new(count: u64) -> Self {
        Self {
            success: true,
            count,
        }
    }
}
