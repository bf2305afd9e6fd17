//! Health check

use std::sync::Arc;

use auth::PgAuthRepository;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::response::ApiResponse;
use realtime::PresenceRegistry;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub repo: PgAuthRepository,
    pub registry: Arc<PresenceRegistry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    status: &'static str,
    database: &'static str,
    online_users: usize,
}

/// GET /health
pub async fn health(State(state): State<HealthState>) -> Response {
    let database_up = match state.repo.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            false
        }
    };

    let report = HealthReport {
        status: if database_up { "ok" } else { "degraded" },
        database: if database_up { "connected" } else { "disconnected" },
        online_users: state.registry.online_count().await,
    };

    let status = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, ApiResponse::ok("Server is running", report)).into_response()
}
