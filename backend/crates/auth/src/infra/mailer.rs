//! Email Delivery
//!
//! SMTP transport for verification and password reset emails, a logging
//! stand-in for environments without SMTP, and a recorder for tests.

use std::sync::{Arc, Mutex, PoisonError};

use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::notifier::EmailSender;
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Implicit TLS port; every other port negotiates STARTTLS
const SMTPS_PORT: u16 = 465;

/// SMTP settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// RFC 5322 "From" address
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Subject and bodies of one account email
struct Letter {
    subject: &'static str,
    text: String,
    html: String,
}

impl Letter {
    fn verification(display_name: &str, link: &str) -> Self {
        Self {
            subject: "Verify your email address",
            text: format!(
                "Hi {display_name},\n\n\
                 Please confirm your email address by opening the link below:\n\n\
                 {link}\n\n\
                 The link expires in 24 hours. If you did not create an account, ignore this email."
            ),
            html: format!(
                "<p>Hi {display_name},</p>\
                 <p>Please confirm your email address:</p>\
                 <p><a href=\"{link}\">Verify email</a></p>\
                 <p>The link expires in 24 hours. If you did not create an account, ignore this email.</p>"
            ),
        }
    }

    fn password_reset(display_name: &str, link: &str) -> Self {
        Self {
            subject: "Reset your password",
            text: format!(
                "Hi {display_name},\n\n\
                 A password reset was requested for your account. Open the link below to choose a new password:\n\n\
                 {link}\n\n\
                 The link expires in 10 minutes. If you did not request this, ignore this email."
            ),
            html: format!(
                "<p>Hi {display_name},</p>\
                 <p>A password reset was requested for your account.</p>\
                 <p><a href=\"{link}\">Choose a new password</a></p>\
                 <p>The link expires in 10 minutes. If you did not request this, ignore this email.</p>"
            ),
        }
    }
}

fn verification_link(frontend_url: &str, secret: &str) -> String {
    format!("{}/verify-email?token={}", frontend_url.trim_end_matches('/'), secret)
}

fn reset_link(frontend_url: &str, secret: &str) -> String {
    format!("{}/reset-password?token={}", frontend_url.trim_end_matches('/'), secret)
}

// ============================================================================
// SMTP
// ============================================================================

/// Sends through an SMTP relay
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    frontend_url: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig, frontend_url: impl Into<String>) -> AuthResult<Self> {
        let builder = if config.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| AuthError::EmailDelivery(format!("SMTP transport: {e}")))?
        .port(config.port);

        let builder = match (&config.user, &config.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
            frontend_url: frontend_url.into(),
        })
    }

    async fn deliver(&self, to: &Email, letter: Letter) -> AuthResult<()> {
        let from = self
            .from
            .parse()
            .map_err(|e| AuthError::EmailDelivery(format!("invalid from address: {e}")))?;
        let recipient = to
            .as_str()
            .parse()
            .map_err(|e| AuthError::EmailDelivery(format!("invalid recipient: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(recipient)
            .subject(letter.subject)
            .multipart(MultiPart::alternative_plain_html(letter.text, letter.html))
            .map_err(|e| AuthError::EmailDelivery(format!("failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AuthError::EmailDelivery(e.to_string()))?;

        tracing::info!(to = %to.masked(), subject = letter.subject, "Email sent");
        Ok(())
    }
}

impl EmailSender for SmtpEmailSender {
    async fn send_verification(
        &self,
        to: &Email,
        display_name: &str,
        secret: &str,
    ) -> AuthResult<()> {
        let link = verification_link(&self.frontend_url, secret);
        self.deliver(to, Letter::verification(display_name, &link))
            .await
    }

    async fn send_password_reset(
        &self,
        to: &Email,
        display_name: &str,
        secret: &str,
    ) -> AuthResult<()> {
        let link = reset_link(&self.frontend_url, secret);
        self.deliver(to, Letter::password_reset(display_name, &link))
            .await
    }
}

// ============================================================================
// Log only
// ============================================================================

/// Records that an email would have been sent; the secret is not logged
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    async fn send_verification(&self, to: &Email, _display_name: &str, _secret: &str) -> AuthResult<()> {
        tracing::warn!(to = %to.masked(), "SMTP not configured, verification email skipped");
        Ok(())
    }

    async fn send_password_reset(&self, to: &Email, _display_name: &str, _secret: &str) -> AuthResult<()> {
        tracing::warn!(to = %to.masked(), "SMTP not configured, password reset email skipped");
        Ok(())
    }
}

// ============================================================================
// Mailer
// ============================================================================

/// Transport chosen at startup
#[derive(Clone)]
pub enum Mailer {
    Smtp(SmtpEmailSender),
    Log(LogEmailSender),
}

impl Mailer {
    /// SMTP when configured, otherwise log only
    pub fn from_config(config: Option<&SmtpConfig>, frontend_url: &str) -> AuthResult<Self> {
        match config {
            Some(config) => Ok(Mailer::Smtp(SmtpEmailSender::new(config, frontend_url)?)),
            None => Ok(Mailer::Log(LogEmailSender)),
        }
    }
}

impl EmailSender for Mailer {
    async fn send_verification(
        &self,
        to: &Email,
        display_name: &str,
        secret: &str,
    ) -> AuthResult<()> {
        match self {
            Mailer::Smtp(smtp) => smtp.send_verification(to, display_name, secret).await,
            Mailer::Log(log) => log.send_verification(to, display_name, secret).await,
        }
    }

    async fn send_password_reset(
        &self,
        to: &Email,
        display_name: &str,
        secret: &str,
    ) -> AuthResult<()> {
        match self {
            Mailer::Smtp(smtp) => smtp.send_password_reset(to, display_name, secret).await,
            Mailer::Log(log) => log.send_password_reset(to, display_name, secret).await,
        }
    }
}

// ============================================================================
// Recording (tests)
// ============================================================================

/// Which flow an email belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    Verification,
    PasswordReset,
}

/// One captured email
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub kind: SentKind,
    pub to: Email,
    pub secret: String,
}

/// Keeps every email in memory; can be switched to fail every send
#[derive(Debug, Clone, Default)]
pub struct RecordingEmailSender {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    failing: bool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every delivery fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Secret of the most recent email of `kind` sent to `to`
    pub fn last_secret(&self, kind: SentKind, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.kind == kind && m.to.as_str() == to)
            .map(|m| m.secret)
    }

    fn record(&self, kind: SentKind, to: &Email, secret: &str) -> AuthResult<()> {
        if self.failing {
            return Err(AuthError::EmailDelivery("recording sender set to fail".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentEmail {
                kind,
                to: to.clone(),
                secret: secret.to_string(),
            });
        Ok(())
    }
}

impl EmailSender for RecordingEmailSender {
    async fn send_verification(&self, to: &Email, _display_name: &str, secret: &str) -> AuthResult<()> {
        self.record(SentKind::Verification, to, secret)
    }

    async fn send_password_reset(&self, to: &Email, _display_name: &str, secret: &str) -> AuthResult<()> {
        self.record(SentKind::PasswordReset, to, secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links() {
        assert_eq!(
            verification_link("http://localhost:5173/", "abc"),
            "http://localhost:5173/verify-email?token=abc"
        );
        assert_eq!(
            reset_link("https://app.example.com", "abc"),
            "https://app.example.com/reset-password?token=abc"
        );
    }

    #[test]
    fn test_letter_mentions_expiry() {
        let letter = Letter::password_reset("Jane", "https://x/reset");
        assert!(letter.text.contains("10 minutes"));
        assert!(letter.html.contains("https://x/reset"));
    }

    #[tokio::test]
    async fn test_recording_sender() {
        let sender = RecordingEmailSender::new();
        let to = Email::new("jane@example.com").unwrap();
        sender.send_password_reset(&to, "Jane", "s1").await.unwrap();
        sender.send_password_reset(&to, "Jane", "s2").await.unwrap();

        assert_eq!(sender.sent().len(), 2);
        assert_eq!(
            sender.last_secret(SentKind::PasswordReset, "jane@example.com").as_deref(),
            Some("s2")
        );
        assert!(sender.last_secret(SentKind::Verification, "jane@example.com").is_none());
    }

    #[tokio::test]
    async fn test_failing_sender() {
        let sender = RecordingEmailSender::failing();
        let to = Email::new("jane@example.com").unwrap();
        let err = sender.send_verification(&to, "Jane", "s").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailDelivery(_)));
    }
}
