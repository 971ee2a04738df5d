//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the origin, RPC and proxy listeners from a validated config
//! - Install the metrics exporter when enabled
//! - Run every server concurrently until shutdown or the first failure

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::InvalidHeaderName;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::stats::StatsTable;
use crate::{origin, rpc};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to bind {service} listener on {address}: {source}")]
    Bind {
        service: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("proxy listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("invalid stats header name: {0}")]
    HeaderName(#[from] InvalidHeaderName),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),

    #[error("{service} server failed: {source}")]
    Serve {
        service: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Every server bound and ready to run.
pub struct App {
    stats: Arc<StatsTable>,
    proxy: HttpServer,
    proxy_listener: Listener,
    rpc_listener: Option<TcpListener>,
    origin: Option<(TcpListener, String)>,
}

async fn bind_tcp(service: &'static str, address: &str) -> Result<TcpListener, StartupError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            service,
            address: address.to_string(),
            source,
        })?;
    tracing::info!(service, address = ?listener.local_addr().ok(), "Listener bound");
    Ok(listener)
}

impl App {
    /// Bind every listener. The origin goes first so the backend is reachable
    /// before the proxy accepts its first client.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, StartupError> {
        let origin = if config.origin.enabled {
            let listener = bind_tcp("origin", &config.origin.bind_address).await?;
            Some((listener, config.origin.greeting.clone()))
        } else {
            None
        };

        let stats = Arc::new(StatsTable::new());

        let rpc_listener = if config.rpc.enabled {
            Some(bind_tcp("rpc", &config.rpc.bind_address).await?)
        } else {
            None
        };

        let proxy = HttpServer::new(config, stats.clone())?;
        let proxy_listener = Listener::bind(&config.listener).await?;

        if config.observability.metrics_enabled {
            let addr: SocketAddr = config
                .observability
                .metrics_address
                .parse()
                .map_err(|e: std::net::AddrParseError| StartupError::Metrics(e.to_string()))?;
            metrics::init_metrics(addr).map_err(StartupError::Metrics)?;
        }

        Ok(Self {
            stats,
            proxy,
            proxy_listener,
            rpc_listener,
            origin,
        })
    }

    pub fn stats(&self) -> &Arc<StatsTable> {
        &self.stats
    }

    pub fn proxy_addr(&self) -> Option<SocketAddr> {
        self.proxy_listener.local_addr().ok()
    }

    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn origin_addr(&self) -> Option<SocketAddr> {
        self.origin.as_ref().and_then(|(l, _)| l.local_addr().ok())
    }

    /// Run every server until `shutdown` fires. If one server fails the others
    /// are shut down and the first error is returned.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), StartupError> {
        let App {
            stats,
            proxy,
            proxy_listener,
            rpc_listener,
            origin: origin_listener,
        } = self;
        let mut tasks: JoinSet<Result<(), StartupError>> = JoinSet::new();

        if let Some((listener, greeting)) = origin_listener {
            let rx = shutdown.subscribe();
            tasks.spawn(async move {
                origin::serve_origin(listener, greeting, rx)
                    .await
                    .map_err(|source| StartupError::Serve {
                        service: "origin",
                        source,
                    })
            });
        }

        if let Some(listener) = rpc_listener {
            let rx = shutdown.subscribe();
            tasks.spawn(async move {
                rpc::serve_rpc(listener, stats, rx)
                    .await
                    .map_err(|source| StartupError::Serve {
                        service: "rpc",
                        source,
                    })
            });
        }

        let rx = shutdown.subscribe();
        tasks.spawn(async move { proxy.run(proxy_listener, rx).await.map_err(StartupError::from) });

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined.map_err(StartupError::from).and_then(|r| r) {
                tracing::error!(error = %e, "Server exited with error, shutting down");
                shutdown.trigger();
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
