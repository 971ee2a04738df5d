//! Proxy accept loop.
//!
//! # Responsibilities
//! - Build the shared proxy context (backend pool, stats, header name)
//! - Accept client connections and spawn one `ProxySession` per connection
//! - Stop accepting on shutdown and drain live sessions

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::InvalidHeaderName;
use axum::http::HeaderName;
use tokio::sync::broadcast;

use crate::backend::{BackendPool, Connector, TcpConnector};
use crate::config::ProxyConfig;
use crate::net::{Accepted, ConnectionTracker, Listener, ListenerError};
use crate::proxy::{ProxyContext, ProxySession};
use crate::stats::StatsTable;

/// How long shutdown waits for in-flight sessions.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The forwarding proxy server.
pub struct HttpServer<C: Connector = TcpConnector> {
    ctx: ProxyContext<C>,
    tracker: ConnectionTracker,
}

impl HttpServer<TcpConnector> {
    /// Create a server that forwards to `config.backend.address`.
    pub fn new(config: &ProxyConfig, stats: Arc<StatsTable>) -> Result<Self, InvalidHeaderName> {
        let connector = TcpConnector::new(config.backend.address.clone());
        let ctx = ProxyContext {
            pool: Arc::new(BackendPool::new(connector, &config.pool)),
            stats,
            limits: config.limits,
            stats_header: HeaderName::try_from(config.stats.header_name.as_str())?,
        };
        Ok(Self::with_context(ctx))
    }
}

impl<C: Connector> HttpServer<C> {
    pub fn with_context(ctx: ProxyContext<C>) -> Self {
        Self {
            ctx,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept connections until `shutdown` fires, then wait for live sessions.
    ///
    /// A failed accept is logged and the loop keeps going; only a closed
    /// connection limiter ends the loop with an error.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            address = ?listener.local_addr().ok(),
            backend = %self.ctx.pool.address(),
            pool_capacity = self.ctx.pool.capacity(),
            "Proxy server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let Accepted { stream, peer_addr, permit } = match accepted {
                        Ok(accepted) => accepted,
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let guard = self.tracker.track();
                    let session = ProxySession::new(guard.id(), stream, self.ctx.clone());
                    tracing::debug!(connection_id = %guard.id(), peer_addr = %peer_addr, "Session started");

                    tokio::spawn(async move {
                        let _permit = permit;
                        let _guard = guard;
                        // Errors are logged by the session itself.
                        let _ = session.run().await;
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Proxy server stopping");
                    break;
                }
            }
        }

        drop(listener);
        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active_sessions = active, "Draining sessions");
            if !self.tracker.wait_for_idle(DRAIN_TIMEOUT).await {
                tracing::warn!(
                    active_sessions = self.tracker.active_count(),
                    "Sessions still open after drain timeout"
                );
            }
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn bind_local() -> Listener {
        Listener::bind(&ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 16,
        })
        .await
        .unwrap()
    }

    #[test]
    fn rejects_invalid_header_name() {
        let mut config = ProxyConfig::default();
        config.stats.header_name = "bad header".into();
        assert!(HttpServer::new(&config, Arc::new(StatsTable::new())).is_err());
    }

    #[tokio::test]
    async fn unreachable_backend_closes_client_and_server_stops_on_shutdown() {
        // Grab a free port, then release it so nothing listens there.
        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let mut config = ProxyConfig::default();
        config.backend.address = dead_addr.to_string();
        config.pool.acquire_timeout_ms = 10;
        let stats = Arc::new(StatsTable::new());
        let server = HttpServer::new(&config, stats.clone()).unwrap();

        let listener = bind_local().await;
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.run(listener, rx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /foo HTTP/1.1\r\n\r\n").await.unwrap();
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
        assert!(stats.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
