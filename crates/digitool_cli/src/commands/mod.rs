//! CLI command implementations.

pub mod client;
pub mod inspect;
pub mod serve;
pub mod verify;
