//! Connection management for the gateway.
//!
//! Resolves the database address once and keeps the shared connection alive.

pub mod address;
pub mod guardian;

pub use address::{DatabaseAddress, DEFAULT_PORT};
pub use guardian::{ConnectionGuardian, ConnectionLease};
