//! User Password Value Objects
//!
//! Domain wrappers over `platform::password` that speak `AppError`.
//!
//! ## Usage
//! ```rust
//! use auth::domain::value_object::user_password::{RawPassword, UserPassword};
//!
//! let raw = RawPassword::new("Blue-Kettle-42".to_string()).unwrap();
//! let stored = UserPassword::from_raw(&raw, None).unwrap();
//! assert!(stored.verify(&RawPassword::presented("Blue-Kettle-42".to_string()), None));
//! ```

use kernel::error::app_error::{AppError, AppResult, FieldError};
use platform::password::{ClearTextPassword, HashedPassword, PasswordPolicyError};
use std::fmt;

// ============================================================================
// Raw Password (User Input)
// ============================================================================

/// Password typed by the user; zeroized on drop
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// A password about to be stored; the policy is enforced
    pub fn new(raw: String) -> AppResult<Self> {
        Self::new_for_field(raw, "password")
    }

    /// Same as [`RawPassword::new`] with a custom field name in the error
    pub fn new_for_field(raw: String, field: &'static str) -> AppResult<Self> {
        ClearTextPassword::new(raw).map(Self).map_err(|e| {
            let message = match e {
                PasswordPolicyError::EmptyOrWhitespace => "Password is required".to_string(),
                other => other.to_string(),
            };
            AppError::unprocessable("Validation failed")
                .with_field_error(FieldError::new(field, message))
        })
    }

    /// A password that is only checked against a stored hash
    pub fn presented(raw: String) -> Self {
        Self(ClearTextPassword::normalized(raw))
    }

    /// Spend the same work as a real verification, for unknown accounts
    pub fn verify_decoy(&self) {
        HashedPassword::verify_decoy(&self.0);
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

// ============================================================================
// User Password (Hashed, for storage)
// ============================================================================

/// Argon2id PHC string as stored on the user row
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    pub fn from_raw(raw: &RawPassword, pepper: Option<&[u8]>) -> AppResult<Self> {
        raw.0
            .hash(pepper)
            .map(Self)
            .map_err(|e| AppError::internal("Password hashing failed").with_source(e))
    }

    pub fn from_phc_string(phc_string: impl Into<String>) -> AppResult<Self> {
        HashedPassword::from_phc_string(phc_string)
            .map(Self)
            .map_err(|e| AppError::internal("Invalid password hash in database").with_source(e))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    pub fn verify(&self, raw: &RawPassword, pepper: Option<&[u8]>) -> bool {
        self.0.verify(&raw.0, pepper)
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_is_field_error() {
        let err = RawPassword::new_for_field("short".to_string(), "newPassword").unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.errors()[0].field, "newPassword");
    }

    #[test]
    fn test_presented_skips_policy() {
        let stored = UserPassword::from_raw(&RawPassword::presented("short".to_string()), None).unwrap();
        assert!(stored.verify(&RawPassword::presented("short".to_string()), None));
        assert!(!stored.verify(&RawPassword::presented("shorter".to_string()), None));
    }

    #[test]
    fn test_bad_phc_is_internal() {
        assert_eq!(UserPassword::from_phc_string("plain").unwrap_err().status_code(), 500);
    }
}
