//! Domain layer of the Hulul support client.
//!
//! Holds the session and ticket models, the gateway traits the hosted backend
//! is reached through, and the shared error type. Nothing in this crate
//! performs I/O.

pub mod auth;
pub mod config;
pub mod error;
pub mod ticket;

// Re-export common error type
pub use error::{HululError, Result};
