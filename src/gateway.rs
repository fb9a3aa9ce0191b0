//! Statement execution over the shared connection.
//!
//! `Gateway` is the facade callers use. Every statement first checks out the
//! connection from the guardian, then runs, then has its first row
//! materialized.
//!
//! Two contracts are offered. [`Gateway::run`] reports each statement's
//! [`Outcome`] explicitly. The `execute_*` operations keep the best-effort
//! contract: execution failures are logged with the query text and then
//! suppressed, so updates return `Ok(())` and selects return `Ok(None)`.
//! Only initialization, precondition and reconnect errors reach the caller.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::{GatewayConfig, GatewayOptions};
use crate::connection::{ConnectionGuardian, DatabaseAddress};
use crate::db::{
    materialize_first_row, Connector, DatabaseConnection, ParameterMap, PgConnector, ResultRow,
    Statement, StatementKind,
};
use crate::error::{GatewayError, Result};

/// What happened when a statement ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An update completed.
    Applied {
        /// Rows the server reported as affected.
        rows_affected: u64,
    },
    /// A select returned at least one row; this is the first.
    Row(ResultRow),
    /// A select returned no rows.
    NoRows,
    /// The statement failed; the server's message.
    Failed(String),
}

impl Outcome {
    /// Returns true unless the statement failed.
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

/// Data-access facade over a single shared database connection.
#[derive(Debug)]
pub struct Gateway {
    guardian: ConnectionGuardian,
    address: DatabaseAddress,
}

impl Gateway {
    /// Builds a gateway around an already open connection.
    ///
    /// The connection string is read from the connection itself and the host
    /// and port are resolved from it once. Both failures are fatal
    /// `GatewayError::Init` errors.
    pub fn from_connection(
        connection: Box<dyn DatabaseConnection>,
        connector: Arc<dyn Connector>,
        options: GatewayOptions,
    ) -> Result<Self> {
        let connection_string = connection.connection_string().map_err(|e| {
            GatewayError::init(format!("Unable to get metadata from connection: {e}"))
        })?;
        let address = DatabaseAddress::parse(&connection_string)?;

        debug!(
            "Gateway targeting {}:{}",
            address.host(),
            address.port()
        );

        Ok(Self {
            guardian: ConnectionGuardian::new(
                Some(connection),
                connection_string,
                connector,
                options.liveness_timeout,
            ),
            address,
        })
    }

    /// Opens the initial PostgreSQL connection described by `config`.
    pub async fn connect(config: &GatewayConfig) -> Result<Self> {
        let url = config.require_url()?;
        let options = config.options();
        let connector = Arc::new(PgConnector::new(options.connect_timeout));
        let connection = connector.connect(url).await?;

        Self::from_connection(connection, connector, options)
    }

    /// Runs a statement and reports its outcome.
    ///
    /// Execution failures are logged and returned as `Outcome::Failed`.
    /// Reconnect failures are returned as errors.
    pub async fn run(&self, statement: &Statement<'_>) -> Result<Outcome> {
        let mut conn = self.guardian.checkout().await?;

        let result = match statement.kind {
            StatementKind::Update => conn
                .execute(statement)
                .await
                .map(|rows_affected| Outcome::Applied { rows_affected }),
            StatementKind::Select => conn.fetch_first(statement).await.map(|row| match row {
                Some(row) => Outcome::Row(materialize_first_row(Some(row))),
                None => Outcome::NoRows,
            }),
        };
        drop(conn);

        Ok(result.unwrap_or_else(|e| {
            error!(
                "Error while executing SQL {} query '{}': {}",
                describe(statement),
                statement.sql,
                e
            );
            Outcome::Failed(e.to_string())
        }))
    }

    /// Runs a plain mutating statement. Execution failures are logged, not returned.
    pub async fn execute_update(&self, query: &str) -> Result<()> {
        self.run(&Statement::update(query)).await?;
        Ok(())
    }

    /// Runs a plain read statement and returns its first row.
    ///
    /// An empty result yields an empty row; a failed query yields `None`.
    pub async fn execute_select(&self, query: &str) -> Result<Option<ResultRow>> {
        let outcome = self.run(&Statement::select(query)).await?;
        Ok(into_legacy_row(outcome))
    }

    /// Runs a mutating statement with positional parameters.
    ///
    /// `params` must be present; an absent map is rejected before any I/O.
    pub async fn execute_prepared_update(
        &self,
        query: &str,
        params: Option<&ParameterMap>,
    ) -> Result<()> {
        let params = require_params(params)?;
        self.run(&Statement::update(query).bind(params)?).await?;
        Ok(())
    }

    /// Runs a read statement with positional parameters and returns its first row.
    ///
    /// `params` must be present; an absent map is rejected before any I/O.
    pub async fn execute_prepared_select(
        &self,
        query: &str,
        params: Option<&ParameterMap>,
    ) -> Result<Option<ResultRow>> {
        let params = require_params(params)?;
        let outcome = self.run(&Statement::select(query).bind(params)?).await?;
        Ok(into_legacy_row(outcome))
    }

    /// Host resolved at construction.
    pub fn database_host(&self) -> &str {
        self.address.host()
    }

    /// Port resolved at construction.
    pub fn database_port(&self) -> u16 {
        self.address.port()
    }

    /// The connection guardian backing this gateway.
    pub fn guardian(&self) -> &ConnectionGuardian {
        &self.guardian
    }

    /// Closes the shared connection.
    pub async fn close(&self) -> Result<()> {
        self.guardian.close().await
    }
}

fn require_params(params: Option<&ParameterMap>) -> Result<&ParameterMap> {
    params.ok_or_else(|| GatewayError::precondition("parameter map cannot be absent"))
}

fn into_legacy_row(outcome: Outcome) -> Option<ResultRow> {
    match outcome {
        Outcome::Row(row) => Some(row),
        Outcome::NoRows | Outcome::Applied { .. } => Some(ResultRow::new()),
        Outcome::Failed(_) => None,
    }
}

fn describe(statement: &Statement<'_>) -> &'static str {
    match (statement.kind, statement.is_prepared()) {
        (StatementKind::Update, false) => "UPDATE",
        (StatementKind::Update, true) => "prepared UPDATE",
        (StatementKind::Select, false) => "SELECT",
        (StatementKind::Select, true) => "prepared SELECT",
    }
}
