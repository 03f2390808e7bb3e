//! # Digitool Server
//!
//! TCP server and client for DigitoolDB.
//!
//! This crate provides:
//! - A `tokio` TCP server answering JSON requests against a [`digitool_core::Store`]
//! - A matching async [`Client`]
//! - File-based [`ServerConfig`]
//!
//! # Protocol
//!
//! Every frame is one JSON document terminated by a newline. The client sends
//! a request:
//!
//! ```json
//! {"operation": "insert", "database": "shop", "collection": "users", "document": {"name": "Alice"}}
//! ```
//!
//! and the server answers with exactly one response line:
//!
//! ```json
//! {"success": true, "data": {"_id": "..."}}
//! ```
//!
//! A malformed or oversized frame is answered with a validation error and
//! the connection stays open.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod client;
mod config;
mod error;
mod frame;
mod server;

pub use client::Client;
pub use config::{default_data_dir, ServerConfig, DEFAULT_PORT};
pub use error::{ServerError, ServerResult};
pub use server::Server;
