//! Sign In Use Case
//!
//! Authenticates a user by password and opens a session.

use std::sync::Arc;

use chrono::Utc;

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::application::session_manager::{SessionManager, TokenPair};
use crate::domain::entity::user::User;
use crate::domain::repository::AuthRepository;
use crate::domain::value_object::{device_info::DeviceInfo, user_password::RawPassword};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    /// User name or email
    pub identifier: String,
    /// Password
    pub password: String,
}

/// Sign in output
#[derive(Debug)]
pub struct SignInOutput {
    pub tokens: TokenPair,
    pub user: User,
}

/// Sign in use case
pub struct SignInUseCase<R>
where
    R: AuthRepository,
{
    repo: Arc<R>,
    sessions: Arc<SessionManager<R, R>>,
    config: Arc<AuthConfig>,
}

impl<R> SignInUseCase<R>
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

    pub async fn execute(
        &self,
        input: SignInInput,
        device_info: DeviceInfo,
    ) -> AuthResult<SignInOutput> {
        let identifier = input.identifier.trim().to_lowercase();
        let password = RawPassword::presented(input.password);

        let user = if identifier.is_empty() {
            None
        } else {
            within(
                self.config.store_timeout,
                "find_user_by_identifier",
                self.repo.find_user_by_identifier(&identifier),
            )
            .await?
        };

        let Some(user) = user else {
            // Unknown accounts cost one Argon2 verification too.
            password.verify_decoy();
            return Err(AuthError::InvalidCredentials);
        };

        if !user.password.verify(&password, self.config.pepper()) {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        if !user.is_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let tokens = self.sessions.login(user.user_id, device_info).await?;

        if let Err(e) = within(
            self.config.store_timeout,
            "touch_last_active",
            self.repo.touch_last_active(&user.user_id, Utc::now()),
        )
        .await
        {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to record user activity");
        }

        tracing::info!(
            user_id = %user.user_id,
            public_id = %tokens.public_id,
            "User signed in"
        );

        Ok(SignInOutput { tokens, user })
    }
}
