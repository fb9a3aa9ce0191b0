//! Database abstraction layer for the gateway.
//!
//! Provides a trait-based interface over a single database connection so the
//! connection guardian and the gateway can be exercised without a server.

mod materialize;
mod mock;
mod postgres;
mod text;
mod types;

pub use materialize::materialize_first_row;
pub use mock::{ExecutedStatement, MockConnection, MockConnector, MockState};
pub use postgres::{PgConnector, PostgresConnection};
pub use types::{ColumnInfo, ParameterMap, RawRow, ResultRow, Statement, StatementKind, Value};

use crate::error::Result;
use async_trait::async_trait;

/// A single open database connection.
///
/// All operations are async and return Results with GatewayError.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Returns the connection string this connection was opened with.
    fn connection_string(&self) -> Result<String>;

    /// Checks that the connection is still usable.
    async fn ping(&mut self) -> Result<()>;

    /// Runs a statement, returning the number of affected rows.
    async fn execute(&mut self, statement: &Statement<'_>) -> Result<u64>;

    /// Runs a statement and returns its first row, if any.
    async fn fetch_first(&mut self, statement: &Statement<'_>) -> Result<Option<RawRow>>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens new connections from a connection string.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a fresh connection.
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DatabaseConnection>>;
}
