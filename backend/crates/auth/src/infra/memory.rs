//! In-Memory Repository
//!
//! Process-local implementation of both stores, for tests and for running
//! the API without a database. Each call takes the lock once and finishes
//! its check-and-write inside that critical section, which gives the same
//! atomicity the conditional statements give in PostgreSQL.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::AuthTokenId;
use tokio::sync::Mutex;

use crate::domain::entity::{auth_token::AuthToken, user::User};
use crate::domain::repository::{CredentialStore, TokenRotation, UserDirectory};
use crate::domain::value_object::{
    email::Email, public_id::PublicId, token_digest::TokenDigest, token_kind::TokenKind,
    user_id::UserId, user_name::UserName, user_password::UserPassword,
};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    tokens: HashMap<AuthTokenId, AuthToken>,
}

impl State {
    fn deactivate(token: &mut AuthToken, now: DateTime<Utc>) {
        token.is_active = false;
        token.revoked_at = Some(now);
    }
}

/// In-memory auth repository
#[derive(Clone, Default)]
pub struct InMemoryAuthRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, including inactive ones
    pub async fn token_snapshot(&self) -> Vec<AuthToken> {
        self.state.lock().await.tokens.values().cloned().collect()
    }

    /// Flip the active flag of a user, as an administrator would
    pub async fn set_user_active(&self, user_id: &UserId, active: bool) -> bool {
        let mut state = self.state.lock().await;
        match state.users.get_mut(user_id) {
            Some(user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Credential Store Implementation
// ============================================================================

impl CredentialStore for InMemoryAuthRepository {
    async fn insert_token(&self, token: &AuthToken) -> AuthResult<()> {
        token.validate()?;
        let mut state = self.state.lock().await;

        let duplicate = token.public_id.as_ref().is_some_and(|public_id| {
            state
                .tokens
                .values()
                .any(|t| t.public_id.as_ref() == Some(public_id))
        });
        if duplicate {
            return Err(AuthError::Internal("duplicate public id".into()));
        }

        state.tokens.insert(token.token_id, token.clone());
        Ok(())
    }

    async fn insert_superseding(&self, token: &AuthToken, now: DateTime<Utc>) -> AuthResult<u64> {
        token.validate()?;
        let mut state = self.state.lock().await;

        let mut superseded = 0;
        for existing in state.tokens.values_mut() {
            if existing.user_id == token.user_id && existing.kind == token.kind && existing.is_active
            {
                State::deactivate(existing, now);
                superseded += 1;
            }
        }

        state.tokens.insert(token.token_id, token.clone());
        Ok(superseded)
    }

    async fn find_active_token(
        &self,
        digest: &TokenDigest,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .values()
            .find(|t| &t.digest == digest && t.kind == kind && t.is_usable(now))
            .cloned())
    }

    async fn rotate_token(
        &self,
        token_id: AuthTokenId,
        expected: &TokenDigest,
        rotation: &TokenRotation,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        match state.tokens.get_mut(&token_id) {
            Some(token) if &token.digest == expected && token.is_usable(now) => {
                token.digest = rotation.digest.clone();
                token.public_id = Some(rotation.public_id);
                token.expires_at = rotation.expires_at;
                token.last_used_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch_token(
        &self,
        token_id: AuthTokenId,
        expected: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        match state.tokens.get_mut(&token_id) {
            Some(token) if &token.digest == expected && token.is_usable(now) => {
                token.last_used_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_token(
        &self,
        user_id: &UserId,
        digest: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        let token = state.tokens.values_mut().find(|t| {
            &t.user_id == user_id
                && &t.digest == digest
                && t.kind == TokenKind::Refresh
                && t.is_active
        });

        Ok(match token {
            Some(token) => {
                State::deactivate(token, now);
                true
            }
            None => false,
        })
    }

    async fn revoke_all_tokens(
        &self,
        user_id: &UserId,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let mut revoked = 0;
        for token in state.tokens.values_mut() {
            if &token.user_id == user_id && token.kind == kind && token.is_active {
                State::deactivate(token, now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn revoke_session(
        &self,
        user_id: &UserId,
        public_id: &PublicId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        let token = state.tokens.values_mut().find(|t| {
            &t.user_id == user_id
                && t.public_id.as_ref() == Some(public_id)
                && t.kind == TokenKind::Refresh
                && t.is_active
        });

        Ok(match token {
            Some(token) => {
                State::deactivate(token, now);
                true
            }
            None => false,
        })
    }

    async fn list_active_sessions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<AuthToken>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<AuthToken> = state
            .tokens
            .values()
            .filter(|t| &t.user_id == user_id && t.kind == TokenKind::Refresh && t.is_usable(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions)
    }

    async fn consume_one_shot(
        &self,
        digest: &TokenDigest,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>> {
        let mut state = self.state.lock().await;
        let token = state
            .tokens
            .values_mut()
            .find(|t| &t.digest == digest && t.kind == kind && t.is_usable(now));

        Ok(token.map(|token| {
            State::deactivate(token, now);
            token.last_used_at = now;
            token.user_id
        }))
    }

    async fn purge_expired(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| {
            let expired = t.expires_at <= now;
            let stale = !t.is_active && t.revoked_at.is_some_and(|at| at < revoked_before);
            !(expired || stale)
        });
        Ok((before - state.tokens.len()) as u64)
    }
}

// ============================================================================
// User Directory Implementation
// ============================================================================

impl UserDirectory for InMemoryAuthRepository {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        if state.users.values().any(|u| u.user_name == user.user_name) {
            return Err(AuthError::UserNameTaken);
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> AuthResult<Option<User>> {
        let identifier = identifier.trim().to_lowercase();
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.as_str() == identifier || u.user_name.as_str() == identifier)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| &u.email == email).cloned())
    }

    async fn exists_by_user_name(&self, user_name: &UserName) -> AuthResult<bool> {
        let state = self.state.lock().await;
        Ok(state.users.values().any(|u| &u.user_name == user_name))
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let state = self.state.lock().await;
        Ok(state.users.values().any(|u| &u.email == email))
    }

    async fn mark_verified(&self, user_id: &UserId) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        Ok(match state.users.get_mut(user_id) {
            Some(user) => {
                user.is_verified = true;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn mark_password_changed(
        &self,
        user_id: &UserId,
        password: &UserPassword,
        changed_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(user_id).ok_or(AuthError::UserNotFound)?;
        user.password = password.clone();
        user.password_changed_at = Some(changed_at);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_last_active(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        if let Some(user) = self.state.lock().await.users.get_mut(user_id) {
            user.last_active_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::device_info::DeviceInfo;
    use chrono::Duration;

    fn refresh_record(user_id: UserId, secret: &str, now: DateTime<Utc>) -> AuthToken {
        AuthToken::refresh(
            user_id,
            TokenDigest::of(secret),
            PublicId::generate(),
            now + Duration::days(7),
            DeviceInfo::unknown(),
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rotate_is_compare_and_swap() {
        let repo = InMemoryAuthRepository::new();
        let now = Utc::now();
        let record = refresh_record(UserId::new(), "first", now);
        repo.insert_token(&record).await.unwrap();

        let rotation = TokenRotation {
            digest: TokenDigest::of("second"),
            public_id: PublicId::generate(),
            expires_at: now + Duration::days(7),
        };
        let expected = TokenDigest::of("first");

        assert!(repo.rotate_token(record.token_id, &expected, &rotation, now).await.unwrap());
        // The old digest no longer matches.
        assert!(!repo.rotate_token(record.token_id, &expected, &rotation, now).await.unwrap());
        assert_eq!(repo.token_snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_record_is_not_found() {
        let repo = InMemoryAuthRepository::new();
        let now = Utc::now();
        let record = refresh_record(UserId::new(), "s", now);
        repo.insert_token(&record).await.unwrap();

        let later = now + Duration::days(8);
        let found = repo
            .find_active_token(&TokenDigest::of("s"), TokenKind::Refresh, later)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_purge_removes_expired_and_stale() {
        let repo = InMemoryAuthRepository::new();
        let now = Utc::now();
        let user_id = UserId::new();

        let live = refresh_record(user_id, "live", now);
        let expired = refresh_record(user_id, "old", now - Duration::days(10));
        let revoked = refresh_record(user_id, "gone", now);
        for record in [&live, &expired, &revoked] {
            repo.insert_token(record).await.unwrap();
        }
        repo.revoke_token(&user_id, &TokenDigest::of("gone"), now - Duration::days(9))
            .await
            .unwrap();

        let deleted = repo.purge_expired(now, now - Duration::days(7)).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(repo.token_snapshot().await[0].token_id, live.token_id);
    }
}
