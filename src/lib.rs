//! db-gateway - A single-connection PostgreSQL gateway.
//!
//! Gives a provisioning/binding service read and write access to one
//! database through one shared, self-healing connection.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;

pub use config::{GatewayConfig, GatewayOptions};
pub use db::{ParameterMap, ResultRow};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, Outcome};
