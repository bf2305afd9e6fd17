//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier or wrong password; the two are never told apart
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    #[error("Access token is required")]
    MissingAccessToken,

    #[error("Refresh token is required")]
    MissingRefreshToken,

    /// Bad signature, malformed token or wrong key
    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Your session has expired")]
    TokenExpired,

    /// A refresh token presented where an access token is expected, or the reverse
    #[error("Invalid token type")]
    WrongTokenKind,

    /// No active, unexpired record for the presented refresh token
    #[error("Session expired or invalid")]
    SessionInvalid,

    /// Refresh attempted for a user that is gone or deactivated
    #[error("User account not found or deactivated")]
    AccountUnavailable,

    /// Authenticated identity no longer resolves to a user
    #[error("User not found")]
    UnknownUser,

    #[error("Account has been deactivated")]
    AccountDeactivated,

    #[error("Password was changed. Please login again")]
    PasswordChanged,

    #[error("Session not found")]
    SessionNotFound,

    /// Lookup by email or id on an account route
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("New password must be different from current password")]
    PasswordUnchanged,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Username is already taken")]
    UserNameTaken,

    /// Mail transport failure
    #[error("Failed to send email: {0}")]
    EmailDelivery(String),

    /// A store call or email send exceeded its deadline
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Already classified upstream (value object validation)
    #[error("{0}")]
    Rejected(#[from] AppError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials
            | AuthError::EmailNotVerified
            | AuthError::MissingAccessToken
            | AuthError::MissingRefreshToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::WrongTokenKind
            | AuthError::SessionInvalid
            | AuthError::AccountUnavailable
            | AuthError::UnknownUser
            | AuthError::AccountDeactivated
            | AuthError::PasswordChanged
            | AuthError::WrongCurrentPassword => ErrorKind::Unauthorized,
            AuthError::SessionNotFound | AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::InvalidVerificationToken
            | AuthError::InvalidResetToken
            | AuthError::AlreadyVerified
            | AuthError::PasswordUnchanged => ErrorKind::BadRequest,
            AuthError::EmailTaken | AuthError::UserNameTaken => ErrorKind::Conflict,
            AuthError::Rejected(e) => e.kind(),
            AuthError::Timeout(_)
            | AuthError::EmailDelivery(_)
            | AuthError::Database(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Convert to AppError
    ///
    /// Server-side failures are rendered with a generic message; the detail
    /// stays in the logs.
    pub fn into_app_error(self) -> AppError {
        match self {
            AuthError::Rejected(e) => e,
            AuthError::Database(e) => AppError::internal("Internal server error").with_source(e),
            AuthError::Internal(_) => AppError::internal("Internal server error"),
            AuthError::EmailDelivery(_) => AppError::internal("Failed to send email"),
            AuthError::Timeout(_) => {
                AppError::internal("Service temporarily unavailable, please retry")
            }
            other => AppError::new(other.kind(), other.to_string()),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::EmailDelivery(msg) => {
                tracing::error!(message = %msg, "Email delivery failed");
            }
            AuthError::Timeout(operation) => {
                tracing::warn!(operation, "Auth dependency timed out");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::InvalidToken | AuthError::WrongTokenKind => {
                tracing::warn!(error = %self, "Rejected tampered or misused token");
            }
            AuthError::Rejected(e) if e.is_server_error() => {
                tracing::error!(error = %e, "Auth rejected with server error");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.into_app_error().into_response()
    }
}
