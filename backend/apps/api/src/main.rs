//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;
mod health;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use auth::{AuthAppState, Mailer, PgAuthRepository, auth_router, users_router};
use axum::{
    Extension, Router, http,
    http::{Method, header},
    middleware,
    routing::get,
};
use chrono::Utc;
use realtime::{PresenceRegistry, RealtimeState, realtime_router};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, ServerConfig};
use crate::health::{HealthState, health};
use crate::rate_limit::{RateLimitState, rate_limit};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

const DEFAULT_FILTER: &str = "api=info,auth=info,realtime=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    init_tracing(LogFormat::from_env());

    let config = ServerConfig::from_env()?;

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let repo = PgAuthRepository::new(pool.clone());

    let mailer = Mailer::from_config(config.smtp.as_ref(), &config.auth.frontend_url)?;
    if config.smtp.is_none() {
        tracing::warn!("SMTP not configured, account emails will only be logged");
    }

    let auth_state = AuthAppState::new(repo.clone(), mailer, config.auth.clone());

    // Startup cleanup: errors here should not prevent server startup
    match auth_state.sessions.purge_expired(Utc::now()).await {
        Ok(deleted) => {
            tracing::info!(tokens_deleted = deleted, "Credential cleanup completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Credential cleanup failed, continuing anyway");
        }
    }

    let registry = Arc::new(PresenceRegistry::new());

    let limiter = RateLimitState::new(config.rate_limit.clone(), config.trusted_proxies);
    limiter.spawn_pruner();

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let prefix = &config.api_prefix;
    let api = Router::new()
        .nest(&format!("{prefix}/auth"), auth_router(auth_state.clone()))
        .nest(&format!("{prefix}/users"), users_router(auth_state.clone()))
        .layer(middleware::from_fn_with_state(limiter, rate_limit));

    let app = Router::new()
        .route("/health", get(health))
        .with_state(HealthState {
            repo,
            registry: registry.clone(),
        })
        .merge(realtime_router(RealtimeState {
            registry,
            gate: auth_state.gate.clone(),
        }))
        .merge(api)
        .layer(Extension(config.trusted_proxies))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(prefix = %config.api_prefix, "Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// `RUST_LOG` wins; `LOG_LEVEL` sets one level for every crate
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("LOG_LEVEL")
                .map_err(|e| e.to_string())
                .and_then(|level| EnvFilter::try_new(level).map_err(|e| e.to_string()))
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
