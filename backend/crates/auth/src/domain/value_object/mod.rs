//! Value Object Module

pub mod device_info;
pub mod email;
pub mod public_id;
pub mod token_digest;
pub mod token_kind;
pub mod user_id;
pub mod user_name;
pub mod user_password;
pub mod user_role;
