//! Connection identity and drain tracking.
//!
//! # Responsibilities
//! - Hand out process-unique IDs for client and backend connections
//! - Count live client sessions so shutdown can wait for them

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::observability::metrics;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier, rendered as `conn-N` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        // Only uniqueness matters here.
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Live session count, published on a watch channel so shutdown can await
/// it reaching zero.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    live: watch::Sender<u64>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self {
            live: watch::Sender::new(0),
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new session until the returned guard is dropped.
    pub fn track(&self) -> ConnectionGuard {
        self.live.send_modify(|n| *n += 1);
        metrics::record_connection_opened();
        ConnectionGuard {
            live: self.live.clone(),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.live.borrow()
    }

    /// Resolve once no session is live. Returns `false` if `deadline`
    /// elapsed first.
    pub async fn wait_for_idle(&self, deadline: Duration) -> bool {
        let mut rx = self.live.subscribe();
        let drained = tokio::time::timeout(deadline, rx.wait_for(|n| *n == 0))
            .await
            .is_ok();
        drained
    }
}

/// Keeps one session counted in its `ConnectionTracker`.
#[derive(Debug)]
pub struct ConnectionGuard {
    live: watch::Sender<u64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.live.send_modify(|n| *n = n.saturating_sub(1));
        metrics::record_connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
