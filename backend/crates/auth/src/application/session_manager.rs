//! Session Manager
//!
//! Issues, rotates and revokes refresh-token sessions and drives the
//! one-shot email verification and password reset tokens. Holds no state
//! of its own: every decision is made against the credential store, and
//! every consuming write is a single conditional statement there.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::application::token_codec::TokenCodec;
use crate::domain::entity::auth_token::{AuthToken, SessionSummary};
use crate::domain::repository::{CredentialStore, TokenRotation, UserDirectory};
use crate::domain::value_object::{
    device_info::DeviceInfo, public_id::PublicId, token_kind::TokenKind, user_id::UserId,
};
use crate::error::{AuthError, AuthResult};

/// What a successful refresh does with the presented refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshStrategy {
    /// Replace it in place; the presented token stops working
    #[default]
    Rotate,
    /// Keep it; only a new access token is minted
    Reuse,
}

/// Access token plus the refresh token that backs it
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub public_id: PublicId,
}

pub struct SessionManager<S, U>
where
    S: CredentialStore + Send + Sync + 'static,
    U: UserDirectory + Send + Sync + 'static,
{
    store: Arc<S>,
    users: Arc<U>,
    codec: TokenCodec,
    config: Arc<AuthConfig>,
}

impl<S, U> SessionManager<S, U>
where
    S: CredentialStore + Send + Sync + 'static,
    U: UserDirectory + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, users: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self {
            store,
            users,
            codec: TokenCodec::new(&config),
            config,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    // ========================================================================
    // Refresh-token sessions
    // ========================================================================

    /// Open a new session for an already authenticated user
    pub async fn login(&self, user_id: UserId, device_info: DeviceInfo) -> AuthResult<TokenPair> {
        let now = Utc::now();
        let access_token = self.codec.issue_access_token_at(user_id, now)?;
        let issued = self.codec.issue_refresh_token_at(user_id, now)?;

        let record = AuthToken::refresh(
            user_id,
            TokenCodec::hash(&issued.token),
            issued.public_id,
            issued.expires_at,
            device_info,
            now,
        )?;
        self.bounded("insert_token", self.store.insert_token(&record))
            .await?;

        tracing::info!(
            user_id = %user_id,
            public_id = %issued.public_id,
            device = %record.device_info.device_label,
            "Session created"
        );

        Ok(TokenPair {
            access_token,
            refresh_token: issued.token,
            public_id: issued.public_id,
        })
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, presented: &str, strategy: RefreshStrategy) -> AuthResult<TokenPair> {
        let claims = self.codec.verify_refresh(presented)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }

        let now = Utc::now();
        let digest = TokenCodec::hash(presented);

        let record = self
            .bounded(
                "find_active_token",
                self.store.find_active_token(&digest, TokenKind::Refresh, now),
            )
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        if record.user_id != claims.sub {
            tracing::warn!(
                user_id = %record.user_id,
                "Refresh token subject does not match its stored session"
            );
            return Err(AuthError::SessionInvalid);
        }

        let user = self
            .bounded("find_user_by_id", self.users.find_user_by_id(&record.user_id))
            .await?;
        if !user.as_ref().is_some_and(|u| u.is_active) {
            self.bounded(
                "revoke_token",
                self.store.revoke_token(&record.user_id, &digest, now),
            )
            .await?;
            tracing::warn!(user_id = %record.user_id, "Refresh for missing or deactivated account");
            return Err(AuthError::AccountUnavailable);
        }

        let access_token = self.codec.issue_access_token_at(record.user_id, now)?;

        match strategy {
            RefreshStrategy::Rotate => {
                let issued = self.codec.issue_refresh_token_at(record.user_id, now)?;
                let rotation = TokenRotation {
                    digest: TokenCodec::hash(&issued.token),
                    public_id: issued.public_id,
                    expires_at: issued.expires_at,
                };

                let won = self
                    .bounded(
                        "rotate_token",
                        self.store.rotate_token(record.token_id, &digest, &rotation, now),
                    )
                    .await?;
                if !won {
                    tracing::warn!(user_id = %record.user_id, "Lost refresh rotation race");
                    return Err(AuthError::SessionInvalid);
                }

                tracing::debug!(
                    user_id = %record.user_id,
                    public_id = %issued.public_id,
                    "Refresh token rotated"
                );

                Ok(TokenPair {
                    access_token,
                    refresh_token: issued.token,
                    public_id: issued.public_id,
                })
            }
            RefreshStrategy::Reuse => {
                let public_id = record
                    .public_id
                    .ok_or_else(|| AuthError::Internal("refresh record without public id".into()))?;

                let touched = self
                    .bounded(
                        "touch_token",
                        self.store.touch_token(record.token_id, &digest, now),
                    )
                    .await?;
                if !touched {
                    return Err(AuthError::SessionInvalid);
                }

                Ok(TokenPair {
                    access_token,
                    refresh_token: presented.to_string(),
                    public_id,
                })
            }
        }
    }

    /// Revoke the session behind `presented`; false when nothing was active
    pub async fn logout(&self, presented: &str, user_id: UserId) -> AuthResult<bool> {
        let digest = TokenCodec::hash(presented);
        let revoked = self
            .bounded(
                "revoke_token",
                self.store.revoke_token(&user_id, &digest, Utc::now()),
            )
            .await?;

        if revoked {
            tracing::info!(user_id = %user_id, "Session ended");
        }
        Ok(revoked)
    }

    /// Revoke every refresh session of the user
    pub async fn logout_all(&self, user_id: UserId) -> AuthResult<u64> {
        let revoked = self
            .bounded(
                "revoke_all_tokens",
                self.store
                    .revoke_all_tokens(&user_id, TokenKind::Refresh, Utc::now()),
            )
            .await?;

        tracing::info!(user_id = %user_id, revoked, "All sessions ended");
        Ok(revoked)
    }

    /// Active sessions, most recently used first
    pub async fn list_sessions(&self, user_id: UserId) -> AuthResult<Vec<SessionSummary>> {
        let records = self
            .bounded(
                "list_active_sessions",
                self.store.list_active_sessions(&user_id, Utc::now()),
            )
            .await?;

        records.iter().map(SessionSummary::try_from).collect()
    }

    /// Revoke one of the user's own sessions by its public handle
    pub async fn revoke_session(&self, user_id: UserId, public_id: PublicId) -> AuthResult<()> {
        let revoked = self
            .bounded(
                "revoke_session",
                self.store.revoke_session(&user_id, &public_id, Utc::now()),
            )
            .await?;

        if !revoked {
            return Err(AuthError::SessionNotFound);
        }

        tracing::info!(user_id = %user_id, public_id = %public_id, "Session revoked");
        Ok(())
    }

    // ========================================================================
    // One-shot tokens
    // ========================================================================

    /// Plaintext secret for the verification email; only its hash is stored
    pub async fn create_email_verification_token(&self, user_id: UserId) -> AuthResult<String> {
        let now = Utc::now();
        let secret = TokenCodec::random_opaque_secret();
        let record = AuthToken::one_shot(
            user_id,
            TokenKind::EmailVerification,
            TokenCodec::hash(&secret),
            self.config.verification_ttl_chrono(),
            now,
        )?;

        self.bounded("insert_token", self.store.insert_token(&record))
            .await?;

        tracing::debug!(user_id = %user_id, "Email verification token created");
        Ok(secret)
    }

    pub async fn consume_email_verification_token(&self, secret: &str) -> AuthResult<UserId> {
        self.consume(secret, TokenKind::EmailVerification)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)
    }

    /// Plaintext secret for the reset email; earlier live reset tokens of the
    /// user stop working in the same transaction
    pub async fn create_password_reset_token(&self, user_id: UserId) -> AuthResult<String> {
        let now = Utc::now();
        let secret = TokenCodec::random_opaque_secret();
        let record = AuthToken::one_shot(
            user_id,
            TokenKind::PasswordReset,
            TokenCodec::hash(&secret),
            self.config.reset_ttl_chrono(),
            now,
        )?;

        let superseded = self
            .bounded(
                "insert_superseding",
                self.store.insert_superseding(&record, now),
            )
            .await?;

        tracing::debug!(user_id = %user_id, superseded, "Password reset token created");
        Ok(secret)
    }

    /// Owner of the reset token; the caller ends all sessions once the new
    /// password is stored
    pub async fn consume_password_reset_token(&self, secret: &str) -> AuthResult<UserId> {
        self.consume(secret, TokenKind::PasswordReset)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }

    async fn consume(&self, secret: &str, kind: TokenKind) -> AuthResult<Option<UserId>> {
        let digest = TokenCodec::hash(secret);
        self.bounded(
            "consume_one_shot",
            self.store.consume_one_shot(&digest, kind, Utc::now()),
        )
        .await
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Delete expired records and records revoked more than one refresh
    /// lifetime ago
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let revoked_before = now - self.config.refresh_ttl_chrono();
        let deleted = self
            .bounded(
                "purge_expired",
                self.store.purge_expired(now, revoked_before),
            )
            .await?;

        tracing::info!(deleted, "Purged stale credential records");
        Ok(deleted)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = AuthResult<T>>,
    ) -> AuthResult<T> {
        within(self.config.store_timeout, operation, fut).await
    }
}
