//! Email Verification Use Cases
//!
//! Consuming a verification secret, and mailing a fresh one.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::application::session_manager::SessionManager;
use crate::domain::entity::user::User;
use crate::domain::notifier::EmailSender;
use crate::domain::repository::AuthRepository;
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Verify email output
#[derive(Debug)]
pub struct VerifyEmailOutput {
    pub user: User,
    /// The account had been verified before this secret was used
    pub already_verified: bool,
}

/// Verify email use case
pub struct VerifyEmailUseCase<R>
where
    R: AuthRepository,
{
    repo: Arc<R>,
    sessions: Arc<SessionManager<R, R>>,
    config: Arc<AuthConfig>,
}

impl<R> VerifyEmailUseCase<R>
where
    R: AuthRepository,
{
    pub fn new(repo: Arc<R>, sessions: Arc<SessionManager<R, R>>, config: Arc<AuthConfig>) -> Self {
        Self {
            repo,
            sessions,
            config,
        }
    }

    pub async fn execute(&self, secret: &str) -> AuthResult<VerifyEmailOutput> {
        if secret.trim().is_empty() {
            return Err(AuthError::InvalidVerificationToken);
        }

        let user_id = self.sessions.consume_email_verification_token(secret).await?;

        let limit = self.config.store_timeout;
        let mut user = within(limit, "find_user_by_id", self.repo.find_user_by_id(&user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_verified {
            return Ok(VerifyEmailOutput {
                user,
                already_verified: true,
            });
        }

        if !within(limit, "mark_verified", self.repo.mark_verified(&user_id)).await? {
            return Err(AuthError::UserNotFound);
        }
        user.is_verified = true;

        tracing::info!(user_id = %user_id, "Email verified");

        Ok(VerifyEmailOutput {
            user,
            already_verified: false,
        })
    }
}

/// Resend verification use case
pub struct ResendVerificationUseCase<R, E>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    repo: Arc<R>,
    sessions: Arc<SessionManager<R, R>>,
    mailer: Arc<E>,
    config: Arc<AuthConfig>,
}

impl<R, E> ResendVerificationUseCase<R, E>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        sessions: Arc<SessionManager<R, R>>,
        mailer: Arc<E>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            repo,
            sessions,
            mailer,
            config,
        }
    }

    /// Unlike sign up, a delivery failure is reported to the caller
    pub async fn execute(&self, email: &str) -> AuthResult<()> {
        let email = Email::new(email)?;

        let user = within(
            self.config.store_timeout,
            "find_user_by_email",
            self.repo.find_user_by_email(&email),
        )
        .await?
        .ok_or(AuthError::UserNotFound)?;

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        let secret = self
            .sessions
            .create_email_verification_token(user.user_id)
            .await?;

        within(
            self.config.email_timeout,
            "send_verification_email",
            self.mailer
                .send_verification(&user.email, &user.display_name, &secret),
        )
        .await
        .map_err(|e| match e {
            AuthError::EmailDelivery(_) => e,
            other => AuthError::EmailDelivery(other.to_string()),
        })?;

        tracing::info!(user_id = %user.user_id, "Verification email resent");
        Ok(())
    }
}
