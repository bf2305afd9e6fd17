//! PublicId Value Object
//!
//! Non-secret handle for one refresh-token session. Clients see it in the
//! session list and send it back to revoke that device; knowing it grants
//! nothing without also owning the session.
//!
//! ## Usage
//! ```rust
//! use auth::domain::value_object::public_id::PublicId;
//!
//! let handle = PublicId::generate();
//! assert_eq!(handle.as_str().len(), 21);
//! assert_eq!(handle.as_str().parse::<PublicId>().unwrap(), handle);
//! ```
use std::str::FromStr;

use kernel::error::app_error::{AppError, AppResult};
use nid::Nanoid;
use serde::{Deserialize, Serialize};

/// 21-character URL-safe random id (126 bits of entropy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(Nanoid);

impl PublicId {
    /// Fresh random handle
    #[inline]
    pub fn generate() -> Self {
        Self(Nanoid::new())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for PublicId {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Nanoid::from_str(s)
            .map(PublicId)
            .map_err(|_| AppError::not_found("Session not found"))
    }
}

impl std::fmt::Display for PublicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = PublicId::generate();
        let b = PublicId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_valid() {
        let id: PublicId = "V1StGXR8_Z5jdHi6B-myT".parse().unwrap();
        assert_eq!(id.to_string(), "V1StGXR8_Z5jdHi6B-myT");
    }

    #[test]
    fn test_parse_garbage_is_not_found() {
        // A malformed handle can never match a session; answer like a miss.
        let err = "not a handle!".parse::<PublicId>().unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_serializes_as_string() {
        let id: PublicId = "V1StGXR8_Z5jdHi6B-myT".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"V1StGXR8_Z5jdHi6B-myT\"");
    }
}
