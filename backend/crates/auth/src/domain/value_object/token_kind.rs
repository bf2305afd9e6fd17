use serde::{Deserialize, Serialize};
use std::fmt;

/// What a token is for
///
/// Access tokens are never persisted; the other kinds each have a row in
/// the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    EmailVerification,
    PasswordReset,
}

impl TokenKind {
    /// Database / wire code
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::EmailVerification => "email_verification",
            TokenKind::PasswordReset => "password_reset",
        }
    }

    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "access" => Some(TokenKind::Access),
            "refresh" => Some(TokenKind::Refresh),
            "email_verification" => Some(TokenKind::EmailVerification),
            "password_reset" => Some(TokenKind::PasswordReset),
            _ => None,
        }
    }

    /// Consumed exactly once, then dead
    #[inline]
    pub const fn is_one_shot(&self) -> bool {
        matches!(self, TokenKind::EmailVerification | TokenKind::PasswordReset)
    }

    #[inline]
    pub const fn is_persisted(&self) -> bool {
        !matches!(self, TokenKind::Access)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for kind in [
            TokenKind::Access,
            TokenKind::Refresh,
            TokenKind::EmailVerification,
            TokenKind::PasswordReset,
        ] {
            assert_eq!(TokenKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(TokenKind::from_code("session"), None);
    }

    #[test]
    fn test_classification() {
        assert!(!TokenKind::Access.is_persisted());
        assert!(TokenKind::Refresh.is_persisted());
        assert!(!TokenKind::Refresh.is_one_shot());
        assert!(TokenKind::PasswordReset.is_one_shot());
        assert!(TokenKind::EmailVerification.is_one_shot());
    }

    #[test]
    fn test_serde_matches_code() {
        let json = serde_json::to_string(&TokenKind::EmailVerification).unwrap();
        assert_eq!(json, "\"email_verification\"");
    }
}
