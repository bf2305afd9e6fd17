//! Shared Kernel - vocabulary every crate agrees on
//!
//! This crate holds the small core that all other crates depend on:
//! - The error taxonomy and the wire-facing [`error::app_error::AppError`]
//! - The JSON response envelope used by every endpoint
//! - Typed UUID identifiers
//!
//! Anything that changes often belongs in the owning crate, not here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
pub mod response;
