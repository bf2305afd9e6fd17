//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::cookie::CookieConfig;
use platform::crypto::random_hex;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 key for access tokens
    pub access_secret: String,
    /// HS256 key for refresh tokens; must differ from `access_secret`
    pub refresh_secret: String,
    /// Access token lifetime (15 minutes)
    pub access_ttl: Duration,
    /// Refresh token lifetime (7 days)
    pub refresh_ttl: Duration,
    /// Email verification secret lifetime (24 hours)
    pub verification_ttl: Duration,
    /// Password reset secret lifetime (10 minutes)
    pub reset_ttl: Duration,
    /// Refresh token cookie name
    pub refresh_cookie_name: String,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Upper bound for a single credential store or user directory call
    pub store_timeout: Duration,
    /// Upper bound for a single email send
    pub email_timeout: Duration,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Base URL used for links in emails
    pub frontend_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 3600),
            verification_ttl: Duration::from_secs(24 * 3600),
            reset_ttl: Duration::from_secs(10 * 60),
            refresh_cookie_name: "refreshToken".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            store_timeout: Duration::from_secs(5),
            email_timeout: Duration::from_secs(10),
            password_pepper: None,
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create config with random signing secrets (for development)
    ///
    /// Tokens do not survive a restart.
    pub fn with_random_secrets() -> Self {
        Self {
            access_secret: random_hex(32),
            refresh_secret: random_hex(32),
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secrets()
        }
    }

    /// Refresh cookie, Max-Age matching the refresh token lifetime
    pub fn refresh_cookie(&self) -> CookieConfig {
        let mut cookie = CookieConfig::http_only(
            self.refresh_cookie_name.clone(),
            self.refresh_ttl.as_secs() as i64,
            self.cookie_secure,
        );
        cookie.same_site = self.cookie_same_site;
        cookie
    }

    pub fn access_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.access_ttl)
    }

    pub fn refresh_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.refresh_ttl)
    }

    pub fn verification_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.verification_ttl)
    }

    pub fn reset_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.reset_ttl)
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("verification_ttl", &self.verification_ttl)
            .field("reset_ttl", &self.reset_ttl)
            .field("refresh_cookie_name", &self.refresh_cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("store_timeout", &self.store_timeout)
            .field("email_timeout", &self.email_timeout)
            .field("frontend_url", &self.frontend_url)
            .finish_non_exhaustive()
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::seconds(duration.as_secs() as i64)
}
