//! Infrastructure Layer
//!
//! Store implementations and outbound email.

pub mod mailer;
pub mod memory;
pub mod postgres;

pub use mailer::{LogEmailSender, Mailer, RecordingEmailSender, SmtpConfig, SmtpEmailSender};
pub use memory::InMemoryAuthRepository;
pub use postgres::PgAuthRepository;
