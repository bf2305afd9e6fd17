//! Application Layer
//!
//! The session core (token codec, session manager, authentication gate)
//! and the account use cases built on top of it.

pub mod auth_gate;
pub mod change_password;
pub mod config;
pub mod deadline;
pub mod password_reset;
pub mod session_manager;
pub mod sign_in;
pub mod sign_up;
pub mod token_codec;
pub mod verify_email;

// Re-exports
pub use auth_gate::{AuthGate, AuthenticatedUser};
pub use change_password::{ChangePasswordInput, ChangePasswordUseCase};
pub use config::AuthConfig;
pub use password_reset::{ForgotPasswordUseCase, ResetPasswordUseCase};
pub use session_manager::{RefreshStrategy, SessionManager, TokenPair};
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_up::{SignUpInput, SignUpUseCase};
pub use token_codec::{Claims, CodecError, TokenCodec};
pub use verify_email::{ResendVerificationUseCase, VerifyEmailOutput, VerifyEmailUseCase};
