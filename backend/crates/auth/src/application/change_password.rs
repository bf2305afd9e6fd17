//! Change Password Use Case
//!
//! Authenticated password change. Every refresh session is revoked and
//! access tokens issued before the change stop passing the gate.

use std::sync::Arc;

use chrono::Utc;

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::application::session_manager::SessionManager;
use crate::domain::entity::user::User;
use crate::domain::repository::AuthRepository;
use crate::domain::value_object::{
    user_id::UserId,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Change password input
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

/// Change password use case
pub struct ChangePasswordUseCase<R>
where
    R: AuthRepository,
{
    repo: Arc<R>,
    sessions: Arc<SessionManager<R, R>>,
    config: Arc<AuthConfig>,
}

impl<R> ChangePasswordUseCase<R>
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

    /// Returns how many sessions were ended
    pub async fn execute(&self, user_id: UserId, input: ChangePasswordInput) -> AuthResult<u64> {
        let new_password = RawPassword::new_for_field(input.new_password, "newPassword")?;
        let current_password = RawPassword::presented(input.current_password);

        let limit = self.config.store_timeout;
        let user = within(limit, "find_user_by_id", self.repo.find_user_by_id(&user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let pepper = self.config.pepper();
        if !user.password.verify(&current_password, pepper) {
            return Err(AuthError::WrongCurrentPassword);
        }
        if user.password.verify(&new_password, pepper) {
            return Err(AuthError::PasswordUnchanged);
        }

        let password_hash = UserPassword::from_raw(&new_password, pepper)?;
        within(
            limit,
            "mark_password_changed",
            self.repo.mark_password_changed(
                &user_id,
                &password_hash,
                User::password_changed_stamp(Utc::now()),
            ),
        )
        .await?;

        let revoked = self.sessions.logout_all(user_id).await?;

        tracing::info!(user_id = %user_id, revoked, "Password changed");
        Ok(revoked)
    }
}
