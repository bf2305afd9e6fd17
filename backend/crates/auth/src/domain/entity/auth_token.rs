//! Auth Token Entity
//!
//! One persisted credential: a refresh-token session or a one-shot
//! email-verification / password-reset secret. Only the digest of the
//! secret is kept. Records are built through the factories below, which
//! enforce the shape invariants before anything reaches the store.

use chrono::{DateTime, Duration, Utc};
use kernel::id::AuthTokenId;

use crate::domain::value_object::{
    device_info::DeviceInfo, public_id::PublicId, token_digest::TokenDigest,
    token_kind::TokenKind, user_id::UserId,
};
use crate::error::{AuthError, AuthResult};

/// Persisted token record
#[derive(Debug, Clone)]
pub struct AuthToken {
    /// Store-assigned row id
    pub token_id: AuthTokenId,
    pub user_id: UserId,
    pub digest: TokenDigest,
    /// Session handle; `Some` exactly for refresh records
    pub public_id: Option<PublicId>,
    pub kind: TokenKind,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub device_info: DeviceInfo,
}

impl AuthToken {
    /// New refresh-token session
    pub fn refresh(
        user_id: UserId,
        digest: TokenDigest,
        public_id: PublicId,
        expires_at: DateTime<Utc>,
        device_info: DeviceInfo,
        now: DateTime<Utc>,
    ) -> AuthResult<Self> {
        Self::build(
            user_id,
            digest,
            Some(public_id),
            TokenKind::Refresh,
            expires_at,
            device_info,
            now,
        )
    }

    /// New email-verification or password-reset record
    pub fn one_shot(
        user_id: UserId,
        kind: TokenKind,
        digest: TokenDigest,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<Self> {
        if !kind.is_one_shot() {
            return Err(AuthError::Internal(format!(
                "{kind} is not a one-shot token kind"
            )));
        }
        Self::build(
            user_id,
            digest,
            None,
            kind,
            now + ttl,
            DeviceInfo::unknown(),
            now,
        )
    }

    fn build(
        user_id: UserId,
        digest: TokenDigest,
        public_id: Option<PublicId>,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
        device_info: DeviceInfo,
        now: DateTime<Utc>,
    ) -> AuthResult<Self> {
        let token = Self {
            token_id: AuthTokenId::new(),
            user_id,
            digest,
            public_id,
            kind,
            is_active: true,
            expires_at,
            last_used_at: now,
            created_at: now,
            revoked_at: None,
            device_info,
        };
        token.validate()?;
        Ok(token)
    }

    /// Shape invariants; also checked by stores before insert
    pub fn validate(&self) -> AuthResult<()> {
        if !self.kind.is_persisted() {
            return Err(AuthError::Internal("access tokens are never persisted".into()));
        }
        if (self.kind == TokenKind::Refresh) != self.public_id.is_some() {
            return Err(AuthError::Internal(
                "public id must be present exactly for refresh tokens".into(),
            ));
        }
        if self.expires_at <= self.created_at {
            return Err(AuthError::Internal("token expires before it is created".into()));
        }
        Ok(())
    }

    /// Active and not yet expired
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// One entry of a user's session list; never carries the token itself
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub public_id: PublicId,
    pub device_info: DeviceInfo,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl TryFrom<&AuthToken> for SessionSummary {
    type Error = AuthError;

    fn try_from(token: &AuthToken) -> AuthResult<Self> {
        let public_id = token
            .public_id
            .ok_or_else(|| AuthError::Internal("session without public id".into()))?;
        Ok(Self {
            public_id,
            device_info: token.device_info.clone(),
            created_at: token.created_at,
            last_used_at: token.last_used_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_refresh_factory() {
        let t = now();
        let token = AuthToken::refresh(
            UserId::new(),
            TokenDigest::of("jwt"),
            PublicId::generate(),
            t + Duration::days(7),
            DeviceInfo::unknown(),
            t,
        )
        .unwrap();

        assert!(token.is_active);
        assert_eq!(token.kind, TokenKind::Refresh);
        assert!(token.is_usable(t));
        assert!(!token.is_usable(t + Duration::days(7)));
    }

    #[test]
    fn test_one_shot_rejects_refresh_kind() {
        let result = AuthToken::one_shot(
            UserId::new(),
            TokenKind::Refresh,
            TokenDigest::of("s"),
            Duration::minutes(10),
            now(),
        );
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[test]
    fn test_validate_catches_tampering() {
        let t = now();
        let mut token = AuthToken::one_shot(
            UserId::new(),
            TokenKind::PasswordReset,
            TokenDigest::of("s"),
            Duration::minutes(10),
            t,
        )
        .unwrap();
        assert!(token.public_id.is_none());

        token.public_id = Some(PublicId::generate());
        assert!(token.validate().is_err());
    }

    #[test]
    fn test_inactive_is_not_usable() {
        let t = now();
        let mut token = AuthToken::one_shot(
            UserId::new(),
            TokenKind::EmailVerification,
            TokenDigest::of("s"),
            Duration::hours(24),
            t,
        )
        .unwrap();
        token.is_active = false;
        assert!(!token.is_usable(t));
    }

    #[test]
    fn test_summary_from_refresh() {
        let t = now();
        let handle = PublicId::generate();
        let token = AuthToken::refresh(
            UserId::new(),
            TokenDigest::of("jwt"),
            handle,
            t + Duration::days(1),
            DeviceInfo::unknown(),
            t,
        )
        .unwrap();
        let summary = SessionSummary::try_from(&token).unwrap();
        assert_eq!(summary.public_id, handle);
    }
}
