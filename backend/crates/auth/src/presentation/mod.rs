//! Presentation Layer
//!
//! HTTP handlers, DTOs, routers and the authentication middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AuthAppState;
pub use middleware::{ClientDevice, CurrentUser, require_auth};
pub use router::{auth_router, users_router};
