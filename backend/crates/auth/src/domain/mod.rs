//! Domain Layer
//!
//! Contains entities, value objects, and the ports the application layer
//! talks through: the credential store, the user directory and the mailer.

pub mod entity;
pub mod notifier;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    auth_token::{AuthToken, SessionSummary},
    user::User,
};
pub use notifier::EmailSender;
pub use repository::{AuthRepository, CredentialStore, TokenRotation, UserDirectory};
