//! `gasflow-auth` — actor identity and role-based capabilities.
//!
//! Authentication itself is external: an upstream gate has already verified
//! the caller and attached an actor identity. This crate only answers "may
//! this role perform that operation" from a closed role set and an explicit
//! capability table.

pub mod actor;
pub mod role;
pub mod user;

pub use actor::Actor;
pub use role::{Capability, Role};
pub use user::User;
