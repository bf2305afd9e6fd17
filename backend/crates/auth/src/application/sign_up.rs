//! Sign Up Use Case
//!
//! Creates a new, unverified account and mails its verification link.

use std::sync::Arc;

use kernel::error::app_error::{AppError, AppResult, FieldError};

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::application::session_manager::SessionManager;
use crate::domain::entity::user::User;
use crate::domain::notifier::EmailSender;
use crate::domain::repository::AuthRepository;
use crate::domain::value_object::{
    email::Email,
    user_name::UserName,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

pub const DISPLAY_NAME_MAX_LENGTH: usize = 50;

/// Sign up input
pub struct SignUpInput {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Sign up use case
pub struct SignUpUseCase<R, E>
where
    R: AuthRepository,
    E: EmailSender + Send + Sync + 'static,
{
    repo: Arc<R>,
    sessions: Arc<SessionManager<R, R>>,
    mailer: Arc<E>,
    config: Arc<AuthConfig>,
}

impl<R, E> SignUpUseCase<R, E>
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

    pub async fn execute(&self, input: SignUpInput) -> AuthResult<User> {
        let mut errors = Vec::new();
        let user_name = collect(UserName::new(&input.user_name), &mut errors);
        let email = collect(Email::new(input.email), &mut errors);
        let password = collect(RawPassword::new(input.password), &mut errors);
        let display_name = collect(validate_display_name(&input.display_name), &mut errors);

        let (Some(user_name), Some(email), Some(password), Some(display_name)) =
            (user_name, email, password, display_name)
        else {
            return Err(AppError::unprocessable("Validation failed")
                .with_field_errors(errors)
                .into());
        };

        let limit = self.config.store_timeout;
        if within(limit, "exists_by_email", self.repo.exists_by_email(&email)).await? {
            return Err(AuthError::EmailTaken);
        }
        if within(limit, "exists_by_user_name", self.repo.exists_by_user_name(&user_name)).await? {
            return Err(AuthError::UserNameTaken);
        }

        let password_hash = UserPassword::from_raw(&password, self.config.pepper())?;
        let user = User::new(user_name, email, display_name, password_hash);

        within(limit, "create_user", self.repo.create_user(&user)).await?;

        tracing::info!(
            user_id = %user.user_id,
            user_name = %user.user_name,
            "User signed up"
        );

        let secret = self
            .sessions
            .create_email_verification_token(user.user_id)
            .await?;

        // Delivery failure does not fail the sign up.
        if let Err(e) = within(
            self.config.email_timeout,
            "send_verification_email",
            self.mailer
                .send_verification(&user.email, &user.display_name, &secret),
        )
        .await
        {
            tracing::error!(
                user_id = %user.user_id,
                error = %e,
                "Failed to send verification email"
            );
        }

        Ok(user)
    }
}

/// Trimmed, 1 to 50 characters
pub fn validate_display_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    let len = name.chars().count();

    if len == 0 || len > DISPLAY_NAME_MAX_LENGTH {
        return Err(AppError::unprocessable("Validation failed").with_field_error(
            FieldError::new(
                "displayName",
                format!("Display name must be between 1 and {DISPLAY_NAME_MAX_LENGTH} characters"),
            ),
        ));
    }

    Ok(name.to_string())
}

fn collect<T>(result: AppResult<T>, errors: &mut Vec<FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.extend_from_slice(e.errors());
            None
        }
    }
}
