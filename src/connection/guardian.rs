//! Connection guardian: hands out the shared connection, refreshing it first
//! when it is missing or fails its liveness probe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::connection::address::redact;
use crate::db::{Connector, DatabaseConnection, RawRow, Statement};
use crate::error::{GatewayError, Result};

type Slot = Option<Box<dyn DatabaseConnection>>;

/// Owner of the single shared database connection.
///
/// The liveness check and any replacement happen under one lock, and the
/// lock is held while the caller uses the connection.
pub struct ConnectionGuardian {
    slot: Mutex<Slot>,
    connector: Arc<dyn Connector>,
    connection_string: String,
    liveness_timeout: Duration,
    reconnects: AtomicU64,
}

impl ConnectionGuardian {
    /// Creates a guardian around an optional initial connection.
    pub fn new(
        initial: Slot,
        connection_string: impl Into<String>,
        connector: Arc<dyn Connector>,
        liveness_timeout: Duration,
    ) -> Self {
        Self {
            slot: Mutex::new(initial),
            connector,
            connection_string: connection_string.into(),
            liveness_timeout,
            reconnects: AtomicU64::new(0),
        }
    }

    /// Returns a usable connection, reconnecting first if needed.
    ///
    /// Reconnect failures propagate as `GatewayError::Connection`; the stale
    /// handle is kept and probed again on the next call.
    pub async fn checkout(&self) -> Result<ConnectionLease<'_>> {
        let mut slot = self.slot.lock().await;

        let usable = match slot.as_mut() {
            Some(conn) => self.probe(conn).await,
            None => false,
        };

        if !usable {
            warn!("Database connection invalid, trying to refresh the connection");
            let fresh = self.connector.connect(&self.connection_string).await?;

            if let Some(stale) = slot.replace(fresh) {
                self.release(stale).await;
            }

            self.reconnects.fetch_add(1, Ordering::SeqCst);
            info!("Database connection refreshed, connection restored");
        }

        Ok(ConnectionLease { slot })
    }

    /// Runs the liveness probe, bounded by the configured timeout.
    async fn probe(&self, conn: &mut Box<dyn DatabaseConnection>) -> bool {
        match tokio::time::timeout(self.liveness_timeout, conn.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("Liveness probe failed: {}", e);
                false
            }
            Err(_) => {
                debug!("Liveness probe timed out after {:?}", self.liveness_timeout);
                false
            }
        }
    }

    async fn release(&self, conn: Box<dyn DatabaseConnection>) {
        match tokio::time::timeout(self.liveness_timeout, conn.close()).await {
            Ok(Ok(())) => debug!("Closed replaced connection"),
            Ok(Err(e)) => debug!("Error closing replaced connection: {}", e),
            Err(_) => debug!("Timed out closing replaced connection"),
        }
    }

    /// Returns true if a connection handle is currently held.
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Number of times the connection has been refreshed.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Connection string used for reconnects.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Closes the held connection, if any. A later checkout reconnects.
    pub async fn close(&self) -> Result<()> {
        let taken = self.slot.lock().await.take();
        if let Some(conn) = taken {
            conn.close().await?;
        }
        Ok(())
    }
}

/// Exclusive use of the shared connection until dropped.
pub struct ConnectionLease<'a> {
    slot: MutexGuard<'a, Slot>,
}

impl ConnectionLease<'_> {
    fn connection(&mut self) -> Result<&mut Box<dyn DatabaseConnection>> {
        self.slot
            .as_mut()
            .ok_or_else(|| GatewayError::internal("connection slot empty after checkout"))
    }

    /// Runs a statement, returning the number of affected rows.
    pub async fn execute(&mut self, statement: &Statement<'_>) -> Result<u64> {
        self.connection()?.execute(statement).await
    }

    /// Runs a statement and returns its first row, if any.
    pub async fn fetch_first(&mut self, statement: &Statement<'_>) -> Result<Option<RawRow>> {
        self.connection()?.fetch_first(statement).await
    }
}

impl std::fmt::Debug for ConnectionLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("held", &self.slot.is_some())
            .finish()
    }
}

impl std::fmt::Debug for ConnectionGuardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuardian")
            .field("connection_string", &redact(&self.connection_string))
            .field("liveness_timeout", &self.liveness_timeout)
            .field("reconnects", &self.reconnect_count())
            .finish_non_exhaustive()
    }
}
