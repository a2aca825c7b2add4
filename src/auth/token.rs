//! Access token wrapper and claim decoding.

pub mod claims;
pub mod secret;
