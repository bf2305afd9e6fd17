//! PostgreSQL Repository Implementations
//!
//! Every consuming write is a single conditional `UPDATE` whose `WHERE`
//! clause repeats the usability check (`is_active AND expires_at > now`),
//! so concurrent callers are serialized by the row lock and at most one of
//! them sees `rows_affected() == 1`.

use chrono::{DateTime, Utc};
use kernel::id::AuthTokenId;
use sqlx::{PgExecutor, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::entity::{auth_token::AuthToken, user::User};
use crate::domain::repository::{CredentialStore, TokenRotation, UserDirectory};
use crate::domain::value_object::{
    device_info::DeviceInfo, email::Email, public_id::PublicId, token_digest::TokenDigest,
    token_kind::TokenKind, user_id::UserId, user_name::UserName, user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = "user_id, user_name, email, display_name, password_hash, user_role, \
     is_verified, is_active, password_changed_at, last_active_at, created_at, updated_at";

const TOKEN_COLUMNS: &str = "token_id, user_id, token_hash, public_id, kind, is_active, \
     expires_at, last_used_at, created_at, revoked_at, user_agent, ip, device_label";

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Liveness check for the health endpoint
    pub async fn ping(&self) -> AuthResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_with<'e, E>(executor: E, token: &AuthToken) -> AuthResult<()>
    where
        E: PgExecutor<'e>,
    {
        token.validate()?;

        sqlx::query(
            r#"
            INSERT INTO auth_tokens (
                token_id,
                user_id,
                token_hash,
                public_id,
                kind,
                is_active,
                expires_at,
                last_used_at,
                created_at,
                revoked_at,
                user_agent,
                ip,
                device_label
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(token.token_id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(token.digest.as_str())
        .bind(token.public_id.as_ref().map(|p| p.as_str().to_string()))
        .bind(token.kind.code())
        .bind(token.is_active)
        .bind(token.expires_at)
        .bind(token.last_used_at)
        .bind(token.created_at)
        .bind(token.revoked_at)
        .bind(&token.device_info.user_agent)
        .bind(&token.device_info.ip)
        .bind(&token.device_info.device_label)
        .execute(executor)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Credential Store Implementation
// ============================================================================

impl CredentialStore for PgAuthRepository {
    async fn insert_token(&self, token: &AuthToken) -> AuthResult<()> {
        Self::insert_with(&self.pool, token).await
    }

    async fn insert_superseding(&self, token: &AuthToken, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Serializes supersede-then-insert per user. Without the row lock,
        // concurrent transactions cannot see each other's uncommitted insert
        // and each would leave its own record live.
        sqlx::query("SELECT 1 FROM users WHERE user_id = $1 FOR UPDATE")
            .bind(token.user_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

        let superseded = sqlx::query(
            r#"
            UPDATE auth_tokens SET
                is_active = FALSE,
                revoked_at = $3
            WHERE user_id = $1 AND kind = $2 AND is_active
            "#,
        )
        .bind(token.user_id.as_uuid())
        .bind(token.kind.code())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        Self::insert_with(&mut *tx, token).await?;

        tx.commit().await?;
        Ok(superseded)
    }

    async fn find_active_token(
        &self,
        digest: &TokenDigest,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>> {
        let query = format!(
            "SELECT {TOKEN_COLUMNS} FROM auth_tokens \
             WHERE token_hash = $1 AND kind = $2 AND is_active AND expires_at > $3"
        );
        let row = sqlx::query_as::<_, AuthTokenRow>(&query)
            .bind(digest.as_str())
            .bind(kind.code())
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_token()).transpose()
    }

    async fn rotate_token(
        &self,
        token_id: AuthTokenId,
        expected: &TokenDigest,
        rotation: &TokenRotation,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE auth_tokens SET
                token_hash = $3,
                public_id = $4,
                expires_at = $5,
                last_used_at = $6
            WHERE token_id = $1
              AND token_hash = $2
              AND kind = 'refresh'
              AND is_active
              AND expires_at > $6
            "#,
        )
        .bind(token_id.as_uuid())
        .bind(expected.as_str())
        .bind(rotation.digest.as_str())
        .bind(rotation.public_id.as_str())
        .bind(rotation.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn touch_token(
        &self,
        token_id: AuthTokenId,
        expected: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE auth_tokens SET last_used_at = $3
            WHERE token_id = $1 AND token_hash = $2 AND is_active AND expires_at > $3
            "#,
        )
        .bind(token_id.as_uuid())
        .bind(expected.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn revoke_token(
        &self,
        user_id: &UserId,
        digest: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let revoked = sqlx::query(
            r#"
            UPDATE auth_tokens SET
                is_active = FALSE,
                revoked_at = $3
            WHERE user_id = $1 AND token_hash = $2 AND kind = 'refresh' AND is_active
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(digest.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked > 0)
    }

    async fn revoke_all_tokens(
        &self,
        user_id: &UserId,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let revoked = sqlx::query(
            r#"
            UPDATE auth_tokens SET
                is_active = FALSE,
                revoked_at = $3
            WHERE user_id = $1 AND kind = $2 AND is_active
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(kind.code())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked)
    }

    async fn revoke_session(
        &self,
        user_id: &UserId,
        public_id: &PublicId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let revoked = sqlx::query(
            r#"
            UPDATE auth_tokens SET
                is_active = FALSE,
                revoked_at = $3
            WHERE user_id = $1 AND public_id = $2 AND kind = 'refresh' AND is_active
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(public_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked == 1)
    }

    async fn list_active_sessions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<AuthToken>> {
        let query = format!(
            "SELECT {TOKEN_COLUMNS} FROM auth_tokens \
             WHERE user_id = $1 AND kind = 'refresh' AND is_active AND expires_at > $2 \
             ORDER BY last_used_at DESC"
        );
        let rows = sqlx::query_as::<_, AuthTokenRow>(&query)
            .bind(user_id.as_uuid())
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.into_token()).collect()
    }

    async fn consume_one_shot(
        &self,
        digest: &TokenDigest,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE auth_tokens SET
                is_active = FALSE,
                revoked_at = $3,
                last_used_at = $3
            WHERE token_hash = $1 AND kind = $2 AND is_active AND expires_at > $3
            RETURNING user_id
            "#,
        )
        .bind(digest.as_str())
        .bind(kind.code())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner.map(UserId::from_uuid))
    }

    async fn purge_expired(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM auth_tokens
            WHERE expires_at <= $1
               OR (NOT is_active AND revoked_at < $2)
            "#,
        )
        .bind(now)
        .bind(revoked_before)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// User Directory Implementation
// ============================================================================

impl UserDirectory for PgAuthRepository {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                user_name,
                email,
                display_name,
                password_hash,
                user_role,
                is_verified,
                is_active,
                password_changed_at,
                last_active_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.user_name.as_str())
        .bind(user.email.as_str())
        .bind(&user.display_name)
        .bind(user.password.as_phc_string())
        .bind(user.user_role.id())
        .bind(user.is_verified)
        .bind(user.is_active)
        .bind(user.password_changed_at)
        .bind(user.last_active_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let taken = match unique_violation(&e) {
                Some("users_email_key") => Some(AuthError::EmailTaken),
                Some("users_user_name_key") => Some(AuthError::UserNameTaken),
                _ => None,
            };
            taken.unwrap_or(AuthError::Database(e))
        })?;

        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> AuthResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR user_name = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(identifier.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn exists_by_user_name(&self, user_name: &UserName) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_name = $1)",
        )
        .bind(user_name.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn mark_verified(&self, user_id: &UserId) -> AuthResult<bool> {
        let updated = sqlx::query(
            "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn mark_password_changed(
        &self,
        user_id: &UserId,
        password: &UserPassword,
        changed_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $2,
                password_changed_at = $3,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(password.as_phc_string())
        .bind(changed_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn touch_last_active(&self, user_id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        sqlx::query("UPDATE users SET last_active_at = $2 WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Constraint name of a unique violation (SQLSTATE 23505)
fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => db.constraint(),
        _ => None,
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    user_name: String,
    email: String,
    display_name: String,
    password_hash: String,
    user_role: i16,
    is_verified: bool,
    is_active: bool,
    password_changed_at: Option<DateTime<Utc>>,
    last_active_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            user_name: UserName::from_db(self.user_name),
            email: Email::from_db(self.email),
            display_name: self.display_name,
            password: UserPassword::from_phc_string(self.password_hash)?,
            user_role: UserRole::from_id(self.user_role),
            is_verified: self.is_verified,
            is_active: self.is_active,
            password_changed_at: self.password_changed_at,
            last_active_at: self.last_active_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuthTokenRow {
    token_id: Uuid,
    user_id: Uuid,
    token_hash: String,
    public_id: Option<String>,
    kind: String,
    is_active: bool,
    expires_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    user_agent: Option<String>,
    ip: Option<String>,
    device_label: String,
}

impl AuthTokenRow {
    fn into_token(self) -> AuthResult<AuthToken> {
        let kind = TokenKind::from_code(&self.kind)
            .ok_or_else(|| AuthError::Internal(format!("Invalid token kind: {}", self.kind)))?;

        let public_id = self
            .public_id
            .as_deref()
            .map(PublicId::from_str)
            .transpose()
            .map_err(|_| AuthError::Internal("Invalid public_id".to_string()))?;

        Ok(AuthToken {
            token_id: AuthTokenId::from_uuid(self.token_id),
            user_id: UserId::from_uuid(self.user_id),
            digest: TokenDigest::from_db(self.token_hash),
            public_id,
            kind,
            is_active: self.is_active,
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
            revoked_at: self.revoked_at,
            device_info: DeviceInfo {
                user_agent: self.user_agent,
                ip: self.ip,
                device_label: self.device_label,
            },
        })
    }
}

/// Runs against `TEST_DATABASE_URL` when it is set; skipped otherwise
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::user_password::RawPassword;
    use sqlx::postgres::PgPoolOptions;

    async fn repo() -> Option<PgAuthRepository> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        };
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("../../../database/migrations")
            .run(&pool)
            .await
            .unwrap();
        Some(PgAuthRepository::new(pool))
    }

    async fn create_user(repo: &PgAuthRepository) -> UserId {
        let tag = &Uuid::new_v4().simple().to_string()[..12];
        let password =
            UserPassword::from_raw(&RawPassword::presented("pw".to_string()), None).unwrap();
        let user = User::new(
            UserName::new(&format!("u_{tag}")).unwrap(),
            Email::new(&format!("{tag}@example.com")).unwrap(),
            "Reset Race".to_string(),
            password,
        );
        repo.create_user(&user).await.unwrap();
        user.user_id
    }

    async fn live_reset_records(repo: &PgAuthRepository, user_id: &UserId) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM auth_tokens \
             WHERE user_id = $1 AND kind = 'password_reset' AND is_active",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&repo.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_superseding_leaves_one_live_record() {
        let Some(repo) = repo().await else {
            return;
        };
        let user_id = create_user(&repo).await;

        for round in 0..10 {
            let mut tasks = Vec::new();
            for i in 0..4 {
                let repo = repo.clone();
                tasks.push(tokio::spawn(async move {
                    let now = Utc::now();
                    let record = AuthToken::one_shot(
                        user_id,
                        TokenKind::PasswordReset,
                        TokenDigest::of(&format!("reset-{round}-{i}")),
                        chrono::Duration::minutes(10),
                        now,
                    )
                    .unwrap();
                    repo.insert_superseding(&record, now).await
                }));
            }
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            assert_eq!(live_reset_records(&repo, &user_id).await, 1, "round {round}");
        }
    }
}
