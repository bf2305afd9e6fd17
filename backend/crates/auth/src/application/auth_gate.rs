//! Authentication Gate
//!
//! Per-request access token check. Access tokens are stateless, so the
//! only server-side state consulted is the user row: existence, the active
//! flag and the password change stamp.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::application::token_codec::TokenCodec;
use crate::domain::repository::UserDirectory;
use crate::domain::value_object::{
    email::Email, token_kind::TokenKind, user_id::UserId, user_name::UserName,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Verified identity handed to downstream handlers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    #[serde(rename = "id")]
    pub user_id: UserId,
    #[serde(rename = "username")]
    pub user_name: UserName,
    pub display_name: String,
    pub email: Email,
    pub role: UserRole,
    pub is_verified: bool,
    /// `iat` of the presented token
    #[serde(skip)]
    pub issued_at: i64,
}

pub struct AuthGate<U>
where
    U: UserDirectory + Send + Sync + 'static,
{
    users: Arc<U>,
    codec: TokenCodec,
    config: Arc<AuthConfig>,
}

impl<U> AuthGate<U>
where
    U: UserDirectory + Send + Sync + 'static,
{
    pub fn new(users: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self {
            users,
            codec: TokenCodec::new(&config),
            config,
        }
    }

    /// Resolve a bearer token into an identity
    pub async fn authenticate(&self, token: Option<&str>) -> AuthResult<AuthenticatedUser> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;

        let claims = self.codec.verify_access(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongTokenKind);
        }

        let user = within(
            self.config.store_timeout,
            "find_user_by_id",
            self.users.find_user_by_id(&claims.sub),
        )
        .await?
        .ok_or(AuthError::UnknownUser)?;

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        if user.changed_password_after(claims.iat) {
            return Err(AuthError::PasswordChanged);
        }

        self.record_activity(user.user_id);

        Ok(AuthenticatedUser {
            user_id: user.user_id,
            user_name: user.user_name,
            display_name: user.display_name,
            email: user.email,
            role: user.user_role,
            is_verified: user.is_verified,
            issued_at: claims.iat,
        })
    }

    /// Best effort; the request never waits for it
    fn record_activity(&self, user_id: UserId) {
        let users = Arc::clone(&self.users);
        let limit = self.config.store_timeout;

        tokio::spawn(async move {
            let result = within(
                limit,
                "touch_last_active",
                users.touch_last_active(&user_id, Utc::now()),
            )
            .await;
            if let Err(e) = result {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to record user activity");
            }
        });
    }
}
