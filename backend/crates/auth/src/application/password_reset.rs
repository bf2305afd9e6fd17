//! Password Reset Use Cases
//!
//! Forgot password mails a short-lived reset secret; reset password
//! consumes it, stores the new hash and ends every session of the account.

use std::sync::Arc;

use chrono::Utc;

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::application::session_manager::SessionManager;
use crate::domain::entity::user::User;
use crate::domain::notifier::EmailSender;
use crate::domain::repository::AuthRepository;
use crate::domain::value_object::{
    email::Email,
    user_id::UserId,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Forgot password use case
pub struct ForgotPasswordUseCase<R, E>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    repo: Arc<R>,
    sessions: Arc<SessionManager<R, R>>,
    mailer: Arc<E>,
    config: Arc<AuthConfig>,
}

impl<R, E> ForgotPasswordUseCase<R, E>
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

    /// Succeeds the same way whether or not the address belongs to an account
    pub async fn execute(&self, email: &str) -> AuthResult<()> {
        let email = Email::new(email)?;

        let user = within(
            self.config.store_timeout,
            "find_user_by_email",
            self.repo.find_user_by_email(&email),
        )
        .await?;

        let Some(user) = user.filter(|u| u.is_active) else {
            tracing::debug!(email = %email.masked(), "Password reset for unknown or inactive account");
            return Ok(());
        };

        let secret = self.sessions.create_password_reset_token(user.user_id).await?;

        if let Err(e) = within(
            self.config.email_timeout,
            "send_password_reset_email",
            self.mailer
                .send_password_reset(&user.email, &user.display_name, &secret),
        )
        .await
        {
            tracing::error!(
                user_id = %user.user_id,
                error = %e,
                "Failed to send password reset email"
            );
        }

        tracing::info!(user_id = %user.user_id, "Password reset requested");
        Ok(())
    }
}

/// Reset password use case
pub struct ResetPasswordUseCase<R>
where
    R: AuthRepository,
{
    repo: Arc<R>,
    sessions: Arc<SessionManager<R, R>>,
    config: Arc<AuthConfig>,
}

impl<R> ResetPasswordUseCase<R>
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

    pub async fn execute(&self, secret: &str, new_password: String) -> AuthResult<UserId> {
        // Policy first, so a rejected password leaves the secret usable.
        let new_password = RawPassword::new(new_password)?;

        if secret.trim().is_empty() {
            return Err(AuthError::InvalidResetToken);
        }
        let user_id = self.sessions.consume_password_reset_token(secret).await?;

        let limit = self.config.store_timeout;
        let user = within(limit, "find_user_by_id", self.repo.find_user_by_id(&user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let password_hash = UserPassword::from_raw(&new_password, self.config.pepper())?;
        within(
            limit,
            "mark_password_changed",
            self.repo.mark_password_changed(
                &user.user_id,
                &password_hash,
                User::password_changed_stamp(Utc::now()),
            ),
        )
        .await?;

        let revoked = self.sessions.logout_all(user.user_id).await?;

        tracing::info!(user_id = %user.user_id, revoked, "Password reset completed");
        Ok(user.user_id)
    }
}
