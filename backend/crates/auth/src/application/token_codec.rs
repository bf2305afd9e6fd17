//! Token Codec
//!
//! Stateless signing and verification of access and refresh tokens, plus
//! the opaque secrets used by the one-shot flows. No I/O happens here.
//!
//! Access and refresh tokens are HS256 JWTs signed with two distinct keys,
//! so a token of one kind never verifies under the other kind's key.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind as JwtErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::value_object::{
    public_id::PublicId, token_digest::TokenDigest, token_kind::TokenKind, user_id::UserId,
};
use crate::error::{AuthError, AuthResult};

/// Bytes of entropy in a one-shot secret
const OPAQUE_SECRET_BYTES: usize = 32;

/// Payload carried by every signed token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub kind: TokenKind,
    /// Session handle, refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<PublicId>,
    pub iat: i64,
    pub exp: i64,
    /// Makes two tokens minted in the same second distinct
    pub jti: String,
}

/// Why a signed token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

impl From<CodecError> for AuthError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Expired => AuthError::TokenExpired,
            CodecError::Invalid => AuthError::InvalidToken,
        }
    }
}

/// A freshly minted refresh token and the values persisted alongside it
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub public_id: PublicId,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signer/verifier for both token kinds
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_ttl_chrono(),
            refresh_ttl: config.refresh_ttl_chrono(),
            validation,
        }
    }

    // ========================================================================
    // Issuance
    // ========================================================================

    pub fn issue_access_token(&self, user_id: UserId) -> AuthResult<String> {
        self.issue_access_token_at(user_id, Utc::now())
    }

    /// Access token as if minted at `issued_at`
    pub fn issue_access_token_at(
        &self,
        user_id: UserId,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        let claims = Claims {
            sub: user_id,
            kind: TokenKind::Access,
            sid: None,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.access_ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims, &self.access_encoding)
    }

    pub fn issue_refresh_token(&self, user_id: UserId) -> AuthResult<IssuedRefreshToken> {
        self.issue_refresh_token_at(user_id, Utc::now())
    }

    /// Refresh token as if minted at `issued_at`, with a new session handle
    pub fn issue_refresh_token_at(
        &self,
        user_id: UserId,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<IssuedRefreshToken> {
        let public_id = PublicId::generate();
        let expires_at = issued_at + self.refresh_ttl;
        let claims = Claims {
            sub: user_id,
            kind: TokenKind::Refresh,
            sid: Some(public_id),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = self.sign(&claims, &self.refresh_encoding)?;

        Ok(IssuedRefreshToken {
            token,
            public_id,
            expires_at,
        })
    }

    fn sign(&self, claims: &Claims, key: &EncodingKey) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Check signature and expiry under the key of `kind`
    ///
    /// The embedded kind is not compared; callers decide how to treat a
    /// mismatch.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, CodecError> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
            TokenKind::EmailVerification | TokenKind::PasswordReset => {
                return Err(CodecError::Invalid);
            }
        };

        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => CodecError::Expired,
                _ => CodecError::Invalid,
            })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, CodecError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, CodecError> {
        self.verify(token, TokenKind::Refresh)
    }

    // ========================================================================
    // One-shot secrets
    // ========================================================================

    /// 32 random bytes, hex encoded
    pub fn random_opaque_secret() -> String {
        platform::crypto::random_hex(OPAQUE_SECRET_BYTES)
    }

    /// One-way hash under which a secret or refresh token is stored
    pub fn hash(secret: &str) -> TokenDigest {
        TokenDigest::of(secret)
    }
}
