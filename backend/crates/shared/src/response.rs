//! Success envelope
//!
//! Every successful JSON response has the shape
//! `{ "success": true, "message": ..., "data"?: ..., "timestamp": ... }`,
//! mirroring the error envelope rendered for [`crate::error::app_error::AppError`].

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Success response body
///
/// ## Examples
/// ```rust
/// use kernel::response::ApiResponse;
///
/// let body = ApiResponse::ok("Login successful", 42);
/// let json = serde_json::to_value(&body).unwrap();
/// assert_eq!(json["success"], true);
/// assert_eq!(json["data"], 42);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    status: u16,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with data
    pub fn ok(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self::with_status(200, message, Some(data))
    }

    /// 201 with data
    pub fn created(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self::with_status(201, message, Some(data))
    }

    fn with_status(status: u16, message: impl Into<Cow<'static, str>>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            timestamp: Utc::now(),
            status,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }
}

impl ApiResponse<()> {
    /// 200 without a `data` field
    pub fn message(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_status(200, message, None)
    }
}

#[cfg(feature = "axum")]
impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_only_omits_data() {
        let json = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Logged out");
        assert!(json.get("data").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_created_status() {
        let body = ApiResponse::created("Registered", serde_json::json!({"id": 1}));
        assert_eq!(body.status_code(), 201);
    }
}
