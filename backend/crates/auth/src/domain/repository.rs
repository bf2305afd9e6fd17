//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer. Every method takes the caller's clock so that
//! expiry decisions are made against one instant per operation.

use chrono::{DateTime, Utc};
use kernel::id::AuthTokenId;

use crate::domain::entity::{auth_token::AuthToken, user::User};
use crate::domain::value_object::{
    email::Email, public_id::PublicId, token_digest::TokenDigest, token_kind::TokenKind,
    user_id::UserId, user_name::UserName, user_password::UserPassword,
};
use crate::error::AuthResult;

/// Replacement values written by a refresh-token rotation
#[derive(Debug, Clone)]
pub struct TokenRotation {
    pub digest: TokenDigest,
    pub public_id: PublicId,
    pub expires_at: DateTime<Utc>,
}

/// Persisted credential records
///
/// Every mutation is a single conditional statement (or one transaction),
/// so two concurrent callers can never both win the same record.
#[trait_variant::make(CredentialStore: Send)]
pub trait LocalCredentialStore {
    /// Insert a new record
    async fn insert_token(&self, token: &AuthToken) -> AuthResult<()>;

    /// Deactivate every active record of the same user and kind, then
    /// insert `token`, atomically. Returns how many records were superseded.
    async fn insert_superseding(&self, token: &AuthToken, now: DateTime<Utc>) -> AuthResult<u64>;

    /// Active, unexpired record by digest and kind
    async fn find_active_token(
        &self,
        digest: &TokenDigest,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>>;

    /// Swap digest, public id and expiry of a refresh record, only if it
    /// still carries `expected` and is active and unexpired
    async fn rotate_token(
        &self,
        token_id: AuthTokenId,
        expected: &TokenDigest,
        rotation: &TokenRotation,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Bump `last_used_at`, under the same condition as a rotation
    async fn touch_token(
        &self,
        token_id: AuthTokenId,
        expected: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Deactivate the user's active refresh record with this digest
    async fn revoke_token(
        &self,
        user_id: &UserId,
        digest: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Deactivate every active record of one kind for the user
    async fn revoke_all_tokens(
        &self,
        user_id: &UserId,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<u64>;

    /// Deactivate the user's active refresh record behind a session handle
    async fn revoke_session(
        &self,
        user_id: &UserId,
        public_id: &PublicId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Active, unexpired refresh records, most recently used first
    async fn list_active_sessions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<AuthToken>>;

    /// Deactivate an active, unexpired one-shot record and return its owner
    async fn consume_one_shot(
        &self,
        digest: &TokenDigest,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>>;

    /// Delete records that expired before `now`, and inactive records
    /// revoked before `revoked_before`
    async fn purge_expired(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> AuthResult<u64>;
}

/// Account lookups and the few account writes authentication performs
#[trait_variant::make(UserDirectory: Send)]
pub trait LocalUserDirectory {
    /// Create a new user
    async fn create_user(&self, user: &User) -> AuthResult<()>;

    /// Find user by ID
    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    /// Find user by email or user name; the identifier is matched case-insensitively
    async fn find_user_by_identifier(&self, identifier: &str) -> AuthResult<Option<User>>;

    /// Find user by email
    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Check if user name exists
    async fn exists_by_user_name(&self, user_name: &UserName) -> AuthResult<bool>;

    /// Check if email exists
    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool>;

    /// Set the verified flag; false when the user does not exist
    async fn mark_verified(&self, user_id: &UserId) -> AuthResult<bool>;

    /// Store a new password hash together with its change stamp
    async fn mark_password_changed(
        &self,
        user_id: &UserId,
        password: &UserPassword,
        changed_at: DateTime<Utc>,
    ) -> AuthResult<()>;

    /// Record activity for presence and profile display
    async fn touch_last_active(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()>;
}

/// Both stores behind one handle, as the infrastructure provides them
pub trait AuthRepository: CredentialStore + UserDirectory + Clone + Send + Sync + 'static {}

impl<T> AuthRepository for T where T: CredentialStore + UserDirectory + Clone + Send + Sync + 'static {}
