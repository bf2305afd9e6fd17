//! Auth Routers
//!
//! `auth_router` is public; every route of `users_router` passes the
//! authentication gate first.

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::domain::notifier::EmailSender;
use crate::domain::repository::AuthRepository;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::require_auth;

/// Routes mounted under `{API_PREFIX}/auth`
pub fn auth_router<R, E>(state: AuthAppState<R, E>) -> Router
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    Router::new()
        .route("/register", post(handlers::register::<R, E>))
        .route("/login", post(handlers::login::<R, E>))
        .route("/refresh", post(handlers::refresh::<R, E>))
        .route("/verify-email", post(handlers::verify_email::<R, E>))
        .route(
            "/resend-verification",
            post(handlers::resend_verification::<R, E>),
        )
        .route("/forgot-password", post(handlers::forgot_password::<R, E>))
        .route("/reset-password", post(handlers::reset_password::<R, E>))
        .with_state(state)
}

/// Routes mounted under `{API_PREFIX}/users`
pub fn users_router<R, E>(state: AuthAppState<R, E>) -> Router
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    Router::new()
        .route("/me", get(handlers::me))
        .route("/logout", post(handlers::logout::<R, E>))
        .route("/logout-all", post(handlers::logout_all::<R, E>))
        .route("/sessions", get(handlers::list_sessions::<R, E>))
        .route(
            "/sessions/{token_id}",
            delete(handlers::revoke_session::<R, E>),
        )
        .route("/change-password", put(handlers::change_password::<R, E>))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_auth::<R>,
        ))
        .with_state(state)
}
