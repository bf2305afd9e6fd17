//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use kernel::response::ApiResponse;

use crate::application::auth_gate::AuthGate;
use crate::application::config::AuthConfig;
use crate::application::session_manager::{RefreshStrategy, SessionManager};
use crate::application::{
    ChangePasswordInput, ChangePasswordUseCase, ForgotPasswordUseCase, ResendVerificationUseCase,
    ResetPasswordUseCase, SignInInput, SignInUseCase, SignUpInput, SignUpUseCase,
    VerifyEmailUseCase,
};
use crate::domain::notifier::EmailSender;
use crate::domain::repository::AuthRepository;
use crate::domain::value_object::public_id::PublicId;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    ChangePasswordRequest, EmailRequest, LoginRequest, LoginResponse, LogoutAllResponse,
    RefreshRequest, RegisterRequest, ResetPasswordRequest, SessionItem, TokenResponse,
    UserResponse, VerifyEmailRequest,
};
use crate::presentation::middleware::{ClientDevice, CurrentUser};

/// Shared state for auth handlers
pub struct AuthAppState<R, E>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub sessions: Arc<SessionManager<R, R>>,
    pub gate: Arc<AuthGate<R>>,
    pub mailer: Arc<E>,
    pub config: Arc<AuthConfig>,
}

impl<R, E> AuthAppState<R, E>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    pub fn new(repo: R, mailer: E, config: AuthConfig) -> Self {
        let repo = Arc::new(repo);
        let config = Arc::new(config);
        Self {
            sessions: Arc::new(SessionManager::new(repo.clone(), repo.clone(), config.clone())),
            gate: Arc::new(AuthGate::new(repo.clone(), config.clone())),
            mailer: Arc::new(mailer),
            repo,
            config,
        }
    }
}

impl<R, E> Clone for AuthAppState<R, E>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            sessions: self.sessions.clone(),
            gate: self.gate.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
        }
    }
}

// ============================================================================
// Register / Verify
// ============================================================================

/// POST /auth/register
pub async fn register<R, E>(
    State(state): State<AuthAppState<R, E>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<ApiResponse<UserResponse>>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let use_case = SignUpUseCase::new(
        state.repo.clone(),
        state.sessions.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );

    let user = use_case
        .execute(SignUpInput {
            user_name: req.user_name,
            email: req.email,
            password: req.password,
            display_name: req.display_name,
        })
        .await?;

    Ok(ApiResponse::created(
        "User registered successfully. Please check your email to verify your account.",
        UserResponse::from(&user),
    ))
}

/// POST /auth/verify-email
pub async fn verify_email<R, E>(
    State(state): State<AuthAppState<R, E>>,
    Json(req): Json<VerifyEmailRequest>,
) -> AuthResult<ApiResponse<UserResponse>>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let use_case =
        VerifyEmailUseCase::new(state.repo.clone(), state.sessions.clone(), state.config.clone());
    let output = use_case.execute(&req.token).await?;

    let message = if output.already_verified {
        "Email already verified"
    } else {
        "Email verified successfully"
    };
    Ok(ApiResponse::ok(message, UserResponse::from(&output.user)))
}

/// POST /auth/resend-verification
pub async fn resend_verification<R, E>(
    State(state): State<AuthAppState<R, E>>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<ApiResponse<()>>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let use_case = ResendVerificationUseCase::new(
        state.repo.clone(),
        state.sessions.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );
    use_case.execute(&req.email).await?;

    Ok(ApiResponse::message("Verification email sent"))
}

// ============================================================================
// Login / Refresh
// ============================================================================

/// POST /auth/login
pub async fn login<R, E>(
    State(state): State<AuthAppState<R, E>>,
    ClientDevice(device): ClientDevice,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Response>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let use_case =
        SignInUseCase::new(state.repo.clone(), state.sessions.clone(), state.config.clone());

    let output = use_case
        .execute(
            SignInInput {
                identifier: req.identifier,
                password: req.password,
            },
            device,
        )
        .await?;

    let cookie = refresh_cookie(&state.config, &output.tokens.refresh_token)?;
    let body = LoginResponse {
        user: UserResponse::from(&output.user),
        access_token: output.tokens.access_token,
        refresh_token: output.tokens.refresh_token,
    };

    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::ok("Login successful", body),
    )
        .into_response())
}

/// POST /auth/refresh
pub async fn refresh<R, E>(
    State(state): State<AuthAppState<R, E>>,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<Response>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let presented = presented_refresh_token(&state.config, &headers, &body)?
        .ok_or(AuthError::MissingRefreshToken)?;

    let pair = state
        .sessions
        .refresh(&presented, RefreshStrategy::Rotate)
        .await?;

    let cookie = refresh_cookie(&state.config, &pair.refresh_token)?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::ok("Token refreshed successfully", TokenResponse::from(pair)),
    )
        .into_response())
}

// ============================================================================
// Password reset
// ============================================================================

/// POST /auth/forgot-password
pub async fn forgot_password<R, E>(
    State(state): State<AuthAppState<R, E>>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<ApiResponse<()>>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let use_case = ForgotPasswordUseCase::new(
        state.repo.clone(),
        state.sessions.clone(),
        state.mailer.clone(),
        state.config.clone(),
    );
    use_case.execute(&req.email).await?;

    Ok(ApiResponse::message(
        "If an account exists with that email, a password reset link has been sent",
    ))
}

/// POST /auth/reset-password
pub async fn reset_password<R, E>(
    State(state): State<AuthAppState<R, E>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Response>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let use_case =
        ResetPasswordUseCase::new(state.repo.clone(), state.sessions.clone(), state.config.clone());
    use_case.execute(&req.token, req.password).await?;

    Ok(with_cleared_cookie(
        &state.config,
        ApiResponse::message("Password reset successful. Please login with your new password"),
    ))
}

// ============================================================================
// Users (behind require_auth)
// ============================================================================

/// GET /users/me
pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    ApiResponse::ok("User retrieved successfully", user)
}

/// POST /users/logout
pub async fn logout<R, E>(
    State(state): State<AuthAppState<R, E>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<Response>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let presented = presented_refresh_token(&state.config, &headers, &body)?
        .ok_or_else(|| AuthError::Rejected(AppError::bad_request("Refresh token is required")))?;

    if !state.sessions.logout(&presented, user.user_id).await? {
        tracing::debug!(user_id = %user.user_id, "Logout with an already inactive refresh token");
    }

    Ok(with_cleared_cookie(
        &state.config,
        ApiResponse::message("Logged out successfully"),
    ))
}

/// POST /users/logout-all
pub async fn logout_all<R, E>(
    State(state): State<AuthAppState<R, E>>,
    CurrentUser(user): CurrentUser,
) -> AuthResult<Response>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let revoked_sessions = state.sessions.logout_all(user.user_id).await?;

    Ok(with_cleared_cookie(
        &state.config,
        ApiResponse::ok(
            "Logged out from all devices",
            LogoutAllResponse { revoked_sessions },
        ),
    ))
}

/// GET /users/sessions
pub async fn list_sessions<R, E>(
    State(state): State<AuthAppState<R, E>>,
    CurrentUser(user): CurrentUser,
) -> AuthResult<ApiResponse<Vec<SessionItem>>>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let sessions = state
        .sessions
        .list_sessions(user.user_id)
        .await?
        .into_iter()
        .map(SessionItem::from)
        .collect();

    Ok(ApiResponse::ok("Sessions retrieved successfully", sessions))
}

/// DELETE /users/sessions/{tokenId}
pub async fn revoke_session<R, E>(
    State(state): State<AuthAppState<R, E>>,
    CurrentUser(user): CurrentUser,
    Path(token_id): Path<String>,
) -> AuthResult<ApiResponse<()>>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let public_id = token_id
        .parse::<PublicId>()
        .map_err(|_| AuthError::SessionNotFound)?;
    state.sessions.revoke_session(user.user_id, public_id).await?;

    Ok(ApiResponse::message("Session revoked successfully"))
}

/// PUT /users/change-password
pub async fn change_password<R, E>(
    State(state): State<AuthAppState<R, E>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<Response>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    let use_case =
        ChangePasswordUseCase::new(state.repo.clone(), state.sessions.clone(), state.config.clone());
    use_case
        .execute(
            user.user_id,
            ChangePasswordInput {
                current_password: req.current_password,
                new_password: req.new_password,
            },
        )
        .await?;

    Ok(with_cleared_cookie(
        &state.config,
        ApiResponse::message("Password changed successfully. Please login again"),
    ))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Refresh token from the JSON body, falling back to the cookie
fn presented_refresh_token(
    config: &AuthConfig,
    headers: &HeaderMap,
    body: &Bytes,
) -> AuthResult<Option<String>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        serde_json::from_slice::<RefreshRequest>(body).map_err(|e| {
            AuthError::Rejected(AppError::bad_request("Malformed JSON body").with_source(e))
        })?
    };

    Ok(request
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| platform::cookie::extract_cookie(headers, &config.refresh_cookie_name)))
}

fn refresh_cookie(config: &AuthConfig, token: &str) -> AuthResult<HeaderValue> {
    config
        .refresh_cookie()
        .set_header(token)
        .ok_or_else(|| AuthError::Internal("refresh cookie is not a valid header value".into()))
}

fn with_cleared_cookie(config: &AuthConfig, body: impl IntoResponse) -> Response {
    match config.refresh_cookie().delete_header() {
        Some(cookie) => ([(header::SET_COOKIE, cookie)], body).into_response(),
        None => body.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::development()
    }

    #[test]
    fn test_refresh_token_prefers_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refreshToken=from-cookie"));

        let body = Bytes::from_static(br#"{"refreshToken":"from-body"}"#);
        let token = presented_refresh_token(&config(), &headers, &body).unwrap();
        assert_eq!(token.as_deref(), Some("from-body"));
    }

    #[test]
    fn test_refresh_token_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; refreshToken=abc"));

        let token = presented_refresh_token(&config(), &headers, &Bytes::new()).unwrap();
        assert_eq!(token.as_deref(), Some("abc"));

        let body = Bytes::from_static(br#"{"refreshToken":""}"#);
        let token = presented_refresh_token(&config(), &headers, &body).unwrap();
        assert_eq!(token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_refresh_token_absent() {
        let token = presented_refresh_token(&config(), &HeaderMap::new(), &Bytes::new()).unwrap();
        assert!(token.is_none());
    }

    #[test]
    fn test_malformed_body_is_bad_request() {
        let err = presented_refresh_token(&config(), &HeaderMap::new(), &Bytes::from_static(b"{"))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
