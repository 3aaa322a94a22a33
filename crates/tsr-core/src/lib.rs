//! tsremote core - shared types for the remote-apps client
//!
//! This crate provides configuration, connection state and the fault
//! taxonomy shared between the protocol and client crates.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod state;

// Re-exports for convenience
pub use config::{merge, AppIdentity, Config, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ConfigError, ConnectionError, Result};
pub use state::ConnectionState;
