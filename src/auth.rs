//! Auth-domain identifiers, roles, access tokens, and session models.

pub mod id;
pub mod role;
pub mod session;
pub mod token;

pub use id::*;
pub use role::*;
pub use session::*;
pub use token::{claims::*, secret::*};
