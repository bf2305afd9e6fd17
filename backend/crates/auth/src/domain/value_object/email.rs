//! Email Value Object
//!
//! Format check only; ownership is proven by the verification flow.

use kernel::error::app_error::{AppError, AppResult, FieldError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// Lowercased, trimmed email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(email: impl Into<String>) -> AppResult<Self> {
        let email = email.into().trim().to_lowercase();

        if email.len() > EMAIL_MAX_LENGTH || !Self::is_valid_format(&email) {
            return Err(AppError::unprocessable("Validation failed")
                .with_field_error(FieldError::new("email", "Please provide a valid email")));
        }

        Ok(Self(email))
    }

    fn is_valid_format(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };

        if local.is_empty() || local.len() > 64 || domain.contains('@') {
            return false;
        }

        !domain.is_empty()
            && domain.contains('.')
            && domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            && !domain.starts_with(['.', '-'])
            && !domain.ends_with(['.', '-'])
    }

    /// Rebuild from a stored column
    pub fn from_db(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `j***@example.com`, for log lines
    pub fn masked(&self) -> String {
        match self.0.split_once('@') {
            Some((local, domain)) => {
                let first = local.chars().next().unwrap_or('*');
                format!("{}***@{}", first, domain)
            }
            None => "***".to_string(),
        }
    }
}

impl FromStr for Email {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Email::new(s)
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_valid() {
        assert!(Email::new("user@example.com").is_ok());
        assert!(Email::new("user.name+tag@example.co.jp").is_ok());
        assert_eq!(Email::new(" User@Example.COM ").unwrap().as_str(), "user@example.com");
    }

    #[test]
    fn test_email_invalid() {
        for bad in ["", "userexample.com", "user@", "@example.com", "a@@b.com", "u@example", "u@-x.com"] {
            let err = Email::new(bad).unwrap_err();
            assert_eq!(err.status_code(), 422, "{bad}");
        }
    }

    #[test]
    fn test_masked() {
        let email = Email::new("jane@example.com").unwrap();
        assert_eq!(email.masked(), "j***@example.com");
    }
}
