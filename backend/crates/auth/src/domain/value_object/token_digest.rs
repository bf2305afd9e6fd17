//! Token Digest Value Object
//!
//! The at-rest form of every persisted token: SHA-256 of the secret, hex
//! encoded. Lookups hash the presented value and compare digests, so the
//! store never holds anything that can be replayed.

use std::fmt;

/// SHA-256 hex digest of a token secret
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenDigest(String);

impl TokenDigest {
    /// Digest a presented secret (signed refresh token or opaque secret)
    pub fn of(secret: &str) -> Self {
        Self(platform::crypto::sha256_hex(secret.as_bytes()))
    }

    /// Rebuild from a stored column
    pub fn from_db(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Only a short prefix is ever printed, enough to correlate log lines.
impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({}…)", self.0.get(..8).unwrap_or(self.0.as_str()))
    }
}
