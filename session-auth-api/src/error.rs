use serde::{Deserialize, Serialize};

/// Machine-readable hints attached to an error so the client can pick the
/// right screen (e.g. the "already logged in" dialog) without parsing messages.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorFlags {
    /// Login refused because another device holds the active session.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_logged_in: bool,
    /// The presented session was displaced by a login elsewhere.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub logged_in_elsewhere: bool,
    /// The client must authenticate again.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_login: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i64>,
}

/// Public API error response format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(flatten)]
    pub flags: ErrorFlags,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            details: None,
            flags: ErrorFlags::default(),
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ErrorFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_flattened_and_empty_ones_omitted() {
        let response = ErrorResponse::new("SESSION_ACTIVE_ELSEWHERE", "Already logged in")
            .with_flags(ErrorFlags {
                already_logged_in: true,
                attempts_remaining: Some(2),
                ..ErrorFlags::default()
            });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["already_logged_in"], true);
        assert_eq!(json["attempts_remaining"], 2);
        assert!(json.get("logged_in_elsewhere").is_none());
        assert!(json.get("cooldown_minutes").is_none());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn deserializes_without_flags() {
        let raw = r#"{"success":false,"error":"INVALID_CREDENTIALS","message":"Invalid email or password"}"#;
        let response: ErrorResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.flags, ErrorFlags::default());
    }
}
