//! Realtime Error Types

use auth::AuthError;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The access token did not pass the gate
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    /// Not a WebSocket handshake
    #[error("WebSocket upgrade rejected")]
    Upgrade(WebSocketUpgradeRejection),

    /// Inbound frame that is not a known event
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// Binary frames are not part of the protocol
    #[error("Unsupported frame")]
    UnsupportedFrame,
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> Response {
        match self {
            RealtimeError::Unauthorized(e) => e.into_response(),
            RealtimeError::Upgrade(rejection) => rejection.into_response(),
            other => {
                tracing::debug!(error = %other, "Realtime request rejected");
                kernel::error::app_error::AppError::bad_request(other.to_string()).into_response()
            }
        }
    }
}
