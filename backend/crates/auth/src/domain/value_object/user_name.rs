//! User Name Value Object
//!
//! Lowercase handle, 3 to 20 characters of `[a-z0-9_]`. Input is trimmed
//! and lowercased, so `Alice` and `alice` are the same account.

use kernel::error::app_error::{AppError, AppResult, FieldError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const USER_NAME_MIN_LENGTH: usize = 3;
pub const USER_NAME_MAX_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    pub fn new(raw: &str) -> AppResult<Self> {
        let name = raw.trim().to_lowercase();

        let problem = if name.len() < USER_NAME_MIN_LENGTH || name.len() > USER_NAME_MAX_LENGTH {
            Some(format!(
                "Username must be between {} and {} characters",
                USER_NAME_MIN_LENGTH, USER_NAME_MAX_LENGTH
            ))
        } else if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            Some("Username can only contain letters, numbers, and underscores".to_string())
        } else {
            None
        };

        match problem {
            Some(message) => Err(AppError::unprocessable("Validation failed")
                .with_field_error(FieldError::new("username", message))),
            None => Ok(Self(name)),
        }
    }

    /// Rebuild from a stored column
    pub fn from_db(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
