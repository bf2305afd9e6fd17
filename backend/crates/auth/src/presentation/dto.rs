//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::session_manager::TokenPair;
use crate::domain::entity::auth_token::SessionSummary;
use crate::domain::entity::user::User;

// ============================================================================
// Register
// ============================================================================

/// Register request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(rename = "username", alias = "userName")]
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

// ============================================================================
// Login / Refresh
// ============================================================================

/// Login request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// User name or email
    #[serde(alias = "email", alias = "username")]
    pub identifier: String,
    pub password: String,
}

/// Body of refresh and logout; the cookie is used when the field is absent
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Login response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

// ============================================================================
// Email verification / password reset
// ============================================================================

/// Verify email request
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Resend verification and forgot password request
#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Reset password request
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Change password request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Users
// ============================================================================

/// Public view of an account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id.to_string(),
            username: user.user_name.as_str().to_string(),
            email: user.email.as_str().to_string(),
            display_name: user.display_name.clone(),
            role: user.user_role.code().to_string(),
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// One row of the session list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    /// Public handle, usable with `DELETE /users/sessions/{id}`
    pub id: String,
    pub user_agent: Option<String>,
    pub device: String,
    pub ip: Option<String>,
    pub login_time: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl From<SessionSummary> for SessionItem {
    fn from(summary: SessionSummary) -> Self {
        Self {
            id: summary.public_id.to_string(),
            user_agent: summary.device_info.user_agent,
            device: summary.device_info.device_label,
            ip: summary.device_info.ip,
            login_time: summary.created_at,
            last_used: summary.last_used_at,
        }
    }
}

/// Logout-all response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutAllResponse {
    pub revoked_sessions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_wire_names() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "jane_doe",
            "email": "jane@example.com",
            "password": "correct horse",
            "displayName": "Jane"
        }))
        .unwrap();
        assert_eq!(req.user_name, "jane_doe");
        assert_eq!(req.display_name, "Jane");
    }

    #[test]
    fn test_login_request_accepts_email_field() {
        let req: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "jane@example.com",
            "password": "pw"
        }))
        .unwrap();
        assert_eq!(req.identifier, "jane@example.com");
    }

    #[test]
    fn test_refresh_request_field_is_optional() {
        let req: RefreshRequest = serde_json::from_str("{}").unwrap();
        assert!(req.refresh_token.is_none());

        let req: RefreshRequest =
            serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(req.refresh_token.as_deref(), Some("abc"));
    }
}
