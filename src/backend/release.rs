//! Detached hand-back of backend connections.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::backend::connection::{BackendConnection, Connector};
use crate::backend::pool::{BackendPool, ReleaseOutcome};

/// Return `conn` to `pool` on a separate task so the caller never waits on
/// the pool, not even for closing a surplus connection.
pub fn spawn_release<C: Connector>(
    pool: Arc<BackendPool<C>>,
    conn: BackendConnection<C::Stream>,
) -> JoinHandle<ReleaseOutcome> {
    tokio::spawn(async move { pool.release(conn).await })
}
