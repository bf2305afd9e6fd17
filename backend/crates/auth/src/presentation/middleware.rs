//! Auth Middleware
//!
//! Gate for protected routes plus the extractors handlers use to read the
//! authenticated identity and the calling device.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::Request;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use platform::client::{TrustedProxies, bearer_token, extract_client_info};

use crate::application::auth_gate::{AuthGate, AuthenticatedUser};
use crate::domain::repository::UserDirectory;
use crate::domain::value_object::device_info::DeviceInfo;
use crate::error::AuthError;

/// Middleware that requires a valid access token
///
/// On success the [`AuthenticatedUser`] is stored in the request extensions
/// for [`CurrentUser`].
pub async fn require_auth<U>(
    State(gate): State<Arc<AuthGate<U>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError>
where
    U: UserDirectory + Send + Sync + 'static,
{
    let user = gate.authenticate(bearer_token(req.headers())).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Identity placed by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::MissingAccessToken)
    }
}

/// Device snapshot of the caller; works with or without `ConnectInfo`
///
/// `X-Forwarded-For` is only consulted when a [`TrustedProxies`] extension
/// is present.
#[derive(Debug, Clone)]
pub struct ClientDevice(pub DeviceInfo);

impl<S> FromRequestParts<S> for ClientDevice
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        let proxies = parts
            .extensions
            .get::<TrustedProxies>()
            .copied()
            .unwrap_or_default();

        Ok(ClientDevice(
            extract_client_info(&parts.headers, peer, proxies).into(),
        ))
    }
}
