//! Mock database connection for testing.
//!
//! Provides an in-memory connection with scripted rows and failures, plus a
//! connector that hands out such connections, so the guardian and gateway
//! can be tested without a server.

use super::{Connector, DatabaseConnection, RawRow, Statement};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Observations shared by every mock connection created from the same script.
#[derive(Debug, Default)]
pub struct MockState {
    statements: Mutex<Vec<ExecutedStatement>>,
    pings: AtomicUsize,
    closed: AtomicUsize,
    connects: AtomicUsize,
}

/// A statement as seen by a mock connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    /// Id of the connection that ran it (0 is the first connection).
    pub connection_id: usize,
    /// Query text.
    pub sql: String,
    /// Bind values, if prepared.
    pub binds: Option<Vec<String>>,
}

impl MockState {
    /// Statements run so far, across all connections.
    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of liveness probes answered.
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of connections opened through a `MockConnector`.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn record(&self, connection_id: usize, statement: &Statement<'_>) {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ExecutedStatement {
                connection_id,
                sql: statement.sql.to_string(),
                binds: statement
                    .binds
                    .as_ref()
                    .map(|b| b.iter().map(|v| v.to_string()).collect()),
            });
    }
}

/// Behaviour shared by a mock connection and the connector that clones it.
#[derive(Debug, Clone, Default)]
struct Script {
    rows: Vec<RawRow>,
    fail_on: Option<String>,
    rows_affected: u64,
}

/// A mock connection that returns predefined rows.
#[derive(Debug)]
pub struct MockConnection {
    id: usize,
    connection_string: Option<String>,
    script: Script,
    alive: Arc<AtomicBool>,
    ping_delay: Option<Duration>,
    state: Arc<MockState>,
}

impl MockConnection {
    /// Creates a healthy connection reporting `connection_string` as its metadata.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            id: 0,
            connection_string: Some(connection_string.into()),
            script: Script::default(),
            alive: Arc::new(AtomicBool::new(true)),
            ping_delay: None,
            state: Arc::new(MockState::default()),
        }
    }

    /// Creates a connection whose metadata cannot be read.
    pub fn without_metadata() -> Self {
        Self {
            connection_string: None,
            ..Self::new("")
        }
    }

    /// Rows returned by every select, first row first.
    pub fn with_rows(mut self, rows: Vec<RawRow>) -> Self {
        self.script.rows = rows;
        self
    }

    /// Makes every statement whose text contains `needle` fail.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.script.fail_on = Some(needle.into());
        self
    }

    /// Row count reported by updates.
    pub fn with_rows_affected(mut self, rows_affected: u64) -> Self {
        self.script.rows_affected = rows_affected;
        self
    }

    /// Delays every liveness probe by `delay`.
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = Some(delay);
        self
    }

    /// Switch controlling whether this connection answers liveness probes.
    pub fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }

    /// Shared observations.
    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    /// A connector that opens connections with the same script and state.
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            script: self.script.clone(),
            state: Arc::clone(&self.state),
            refuse: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_failure(&self, statement: &Statement<'_>) -> Result<()> {
        match &self.script.fail_on {
            Some(needle) if statement.sql.contains(needle.as_str()) => Err(GatewayError::query(
                format!("ERROR: syntax error at or near \"{needle}\""),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseConnection for MockConnection {
    fn connection_string(&self) -> Result<String> {
        self.connection_string
            .clone()
            .ok_or_else(|| GatewayError::connection("connection metadata unavailable"))
    }

    async fn ping(&mut self) -> Result<()> {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        self.state.pings.fetch_add(1, Ordering::SeqCst);

        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::connection("connection reset by peer"))
        }
    }

    async fn execute(&mut self, statement: &Statement<'_>) -> Result<u64> {
        self.state.record(self.id, statement);
        self.check_failure(statement)?;
        Ok(self.script.rows_affected)
    }

    async fn fetch_first(&mut self, statement: &Statement<'_>) -> Result<Option<RawRow>> {
        self.state.record(self.id, statement);
        self.check_failure(statement)?;
        Ok(self.script.rows.first().cloned())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens mock connections sharing one script and one `MockState`.
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Script,
    state: Arc<MockState>,
    refuse: Arc<AtomicBool>,
}

impl MockConnector {
    /// Makes subsequent connection attempts fail (or succeed again).
    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DatabaseConnection>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(GatewayError::connection(format!(
                "Cannot connect to {connection_string}. Check that the server is running."
            )));
        }

        let id = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockConnection {
            id,
            connection_string: Some(connection_string.to_string()),
            script: self.script.clone(),
            alive: Arc::new(AtomicBool::new(true)),
            ping_delay: None,
            state: Arc::clone(&self.state),
        }))
    }
}
