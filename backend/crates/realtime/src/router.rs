//! Realtime Router

use axum::{Router, routing::get};

use auth::domain::repository::UserDirectory;

use crate::ws::{RealtimeState, ws_handler};

/// `GET /ws`, mounted at the root rather than under the API prefix
pub fn realtime_router<U>(state: RealtimeState<U>) -> Router
where
    U: UserDirectory + Send + Sync + 'static,
{
    Router::new()
        .route("/ws", get(ws_handler::<U>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use auth::{AuthConfig, AuthGate, InMemoryAuthRepository};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::presence::PresenceRegistry;

    fn app() -> Router {
        let gate = AuthGate::new(
            Arc::new(InMemoryAuthRepository::new()),
            Arc::new(AuthConfig::development()),
        );
        realtime_router(RealtimeState {
            registry: Arc::new(PresenceRegistry::new()),
            gate: Arc::new(gate),
        })
    }

    #[tokio::test]
    async fn test_upgrade_requires_token() {
        let response = app()
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upgrade_rejects_invalid_token() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/ws?token=garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
