//! Auth-domain identifiers, entitlement capability, and token models.

pub mod entitlement;
pub mod id;
pub mod token;

pub use entitlement::*;
pub use id::*;
pub use token::*;
