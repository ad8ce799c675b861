//! Wire types shared by the mapperlab HTTP surface and its clients.

use serde::{Deserialize, Serialize};

/// A `t_user` record as returned by the user endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Result of a write statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsAffectedResponse {
    pub statement: String,
    pub rows_affected: u64,
}

/// Plain acknowledgement with a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const POLICY_VIOLATION: &str = "policy_violation";
    pub const DATA_ACCESS: &str = "data_access_error";
    pub const INVALID_STATEMENT: &str = "invalid_statement";
    pub const INTERNAL: &str = "internal_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_without_email_omits_field() {
        let user = UserResponse {
            id: 7,
            username: "kubo".to_string(),
            email: None,
        };
        let json = serde_json::to_value(&user).expect("serialize user");
        assert_eq!(json, serde_json::json!({ "id": 7, "username": "kubo" }));
    }

    #[test]
    fn error_body_parses_without_hint() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":{"code":"not_found","message":"User not found"}}"#,
        )
        .expect("parse error body");
        assert_eq!(body.error.code, codes::NOT_FOUND);
        assert!(body.error.hint.is_none());
    }
}
