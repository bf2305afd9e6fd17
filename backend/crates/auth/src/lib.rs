//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, store and mailer traits
//! - `application/` - Token codec, session manager, authentication gate, account use cases
//! - `infra/` - PostgreSQL and in-memory stores, SMTP mailer
//! - `presentation/` - HTTP handlers, DTOs, routers, middleware
//!
//! ## Features
//! - Registration with email verification
//! - Login by user name or email, refresh-token sessions with rotation
//! - Session listing and targeted revocation, logout everywhere
//! - Password reset by email and authenticated password change
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Short-lived HS256 access tokens, checked against the account on every request
//! - Refresh and one-shot tokens stored as SHA-256 digests only
//! - Every consuming write is a single conditional statement in the store
//! - A password change invalidates every access token issued before it

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::{AuthGate, AuthenticatedUser, RefreshStrategy, SessionManager, TokenPair};
pub use error::{AuthError, AuthResult};
pub use infra::{InMemoryAuthRepository, Mailer, PgAuthRepository, SmtpConfig};
pub use presentation::{AuthAppState, auth_router, users_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod store {
    pub use crate::infra::memory::InMemoryAuthRepository as MemoryStore;
    pub use crate::infra::postgres::PgAuthRepository as AuthStore;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
