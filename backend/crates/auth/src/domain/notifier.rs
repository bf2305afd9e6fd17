//! Outbound email port

use crate::domain::value_object::email::Email;
use crate::error::AuthResult;

/// Delivers account emails carrying a one-shot secret
#[trait_variant::make(EmailSender: Send)]
pub trait LocalEmailSender {
    async fn send_verification(
        &self,
        to: &Email,
        display_name: &str,
        secret: &str,
    ) -> AuthResult<()>;

    async fn send_password_reset(
        &self,
        to: &Email,
        display_name: &str,
        secret: &str,
    ) -> AuthResult<()>;
}
