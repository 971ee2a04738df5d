//! Bounded pool of idle backend connections.
//!
//! # Responsibilities
//! - Hand out idle connections, waiting a bounded time before dialing
//! - Take connections back without ever blocking the caller
//! - Cap the number of idle connections; close the overflow

use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::backend::connection::{BackendConnection, Connector, TcpConnector};
use crate::backend::BackendError;
use crate::config::PoolConfig;
use crate::observability::metrics;

/// What `release` did with a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Queued for reuse.
    Pooled,
    /// Pool was full; the connection was closed.
    Closed,
}

/// Fixed-capacity queue of idle backend connections.
///
/// Idle connections sit in a bounded channel: `release` is a non-blocking
/// `try_send`, `acquire` is a `recv` raced against the acquisition timeout.
pub struct BackendPool<C: Connector = TcpConnector> {
    connector: C,
    idle_tx: mpsc::Sender<BackendConnection<C::Stream>>,
    idle_rx: Mutex<mpsc::Receiver<BackendConnection<C::Stream>>>,
    acquire_timeout: Duration,
}

impl<C: Connector> BackendPool<C> {
    /// Create a pool. A capacity of zero is treated as one.
    pub fn new(connector: C, config: &PoolConfig) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(config.capacity.max(1));
        Self {
            connector,
            idle_tx,
            idle_rx: Mutex::new(idle_rx),
            acquire_timeout: config.acquire_timeout(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.idle_tx.max_capacity()
    }

    /// Number of idle connections currently queued.
    pub fn idle_count(&self) -> usize {
        self.idle_tx.max_capacity() - self.idle_tx.capacity()
    }

    pub fn address(&self) -> &str {
        self.connector.address()
    }

    /// Take an idle connection, or dial a new one if none shows up within
    /// the acquisition timeout. Dial failures are returned, never retried.
    pub async fn acquire(&self) -> Result<BackendConnection<C::Stream>, BackendError> {
        let waited = tokio::time::timeout(self.acquire_timeout, async {
            self.idle_rx.lock().await.recv().await
        })
        .await;

        if let Ok(Some(conn)) = waited {
            tracing::trace!(backend_connection = %conn.id(), "Reusing pooled backend connection");
            metrics::record_pool_acquire("pooled");
            return Ok(conn);
        }

        self.dial().await
    }

    async fn dial(&self) -> Result<BackendConnection<C::Stream>, BackendError> {
        let stream = self
            .connector
            .connect()
            .await
            .map_err(|source| BackendError::Dial {
                address: self.connector.address().to_string(),
                source,
            })?;

        let conn = BackendConnection::new(stream);
        tracing::debug!(
            backend_connection = %conn.id(),
            address = %self.connector.address(),
            "Dialed backend"
        );
        metrics::record_pool_acquire("dialed");
        Ok(conn)
    }

    /// Return a connection for reuse. Never waits for room: when the pool is
    /// full the connection is closed instead. Close errors are swallowed.
    ///
    /// The connection is not checked; a broken stream is found by its next user.
    pub async fn release(&self, conn: BackendConnection<C::Stream>) -> ReleaseOutcome {
        let conn = match self.idle_tx.try_send(conn) {
            Ok(()) => {
                metrics::record_pool_release("pooled");
                return ReleaseOutcome::Pooled;
            }
            Err(mpsc::error::TrySendError::Full(conn))
            | Err(mpsc::error::TrySendError::Closed(conn)) => conn,
        };

        let id = conn.id();
        if let Err(e) = conn.close().await {
            tracing::debug!(backend_connection = %id, error = %e, "Error closing surplus backend connection");
        }
        tracing::trace!(backend_connection = %id, "Pool full, closed backend connection");
        metrics::record_pool_release("closed");
        ReleaseOutcome::Closed
    }

    /// Drop a connection whose state can no longer be trusted.
    pub fn discard(&self, conn: BackendConnection<C::Stream>) {
        tracing::debug!(backend_connection = %conn.id(), "Discarding backend connection");
        metrics::record_pool_release("discarded");
        drop(conn);
    }
}
