//! Realtime Presence
//!
//! Authenticated WebSocket connections, an online-user registry and the
//! typing / read-receipt events relayed between users.

pub mod error;
pub mod event;
pub mod presence;
pub mod router;
pub mod ws;

pub use error::{RealtimeError, RealtimeResult};
pub use event::{ClientEvent, ServerEvent};
pub use presence::{ConnectionId, PresenceRegistry};
pub use router::realtime_router;
pub use ws::RealtimeState;
