use serde::{Deserialize, Serialize};

// -------- REQUEST DTOs --------
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String, // Plain text
    /// Optional client-computed fingerprint; replaces the IP + user-agent heuristic.
    #[serde(default)]
    pub device_fingerprint: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub password: String, // Plain text
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_approved: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateApprovalRequest {
    pub is_approved: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CleanupSessionsRequest {
    /// Falls back to the server's configured inactivity threshold.
    #[serde(default)]
    pub inactive_minutes: Option<i64>,
}
