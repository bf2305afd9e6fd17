//! Per-IP rate limiting
//!
//! Fixed window counters from `platform::rate_limit`; exhausted clients get
//! 429 with `Retry-After`. Clients are keyed by peer address unless
//! trusted proxies are configured.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use platform::client::{TrustedProxies, extract_client_ip};
use platform::rate_limit::{InMemoryRateLimitStore, RateLimitConfig, RateLimitStore};

#[derive(Clone)]
pub struct RateLimitState {
    pub store: Arc<InMemoryRateLimitStore>,
    pub config: RateLimitConfig,
    pub proxies: TrustedProxies,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig, proxies: TrustedProxies) -> Self {
        Self {
            store: Arc::new(InMemoryRateLimitStore::new()),
            config,
            proxies,
        }
    }

    /// Periodically drop closed windows so idle clients do not pile up
    pub fn spawn_pruner(&self) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.window);
            loop {
                ticker.tick().await;
                let pruned = store.prune(&config).await;
                if pruned > 0 {
                    tracing::debug!(pruned, "Pruned rate limit windows");
                }
            }
        })
    }
}

pub async fn rate_limit(
    State(state): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let key = extract_client_ip(req.headers(), peer, state.proxies)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let result = state.store.check_and_increment(&key, &state.config).await;
    if !result.allowed {
        tracing::warn!(client_ip = %key, "Rate limit exceeded");

        let mut response =
            AppError::too_many_requests("Too many requests, please try again later")
                .into_response();
        let retry_after = result.reset_after.as_secs().max(1);
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(req).await
}
