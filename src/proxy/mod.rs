//! Per-client proxy loop.
//!
//! # Data Flow
//! ```text
//! AwaitRequest ──EOF──────────────────────────────────────────▶ Terminate
//!     │ request
//!     ▼
//! AcquireBackend ──dial error─────────────────────────────────▶ Terminate
//!     ▼
//! Forward ──write error (discard backend)─────────────────────▶ Terminate
//!     ▼
//! AwaitResponse ──read error (discard backend)────────────────▶ Terminate
//!     ▼
//! update stats → RelayResponse → spawn release ──┬─ keep-alive ─▶ AwaitRequest
//!                                                └─ close/error ─▶ Terminate
//! ```
//!
//! # Design Decisions
//! - Requests on one connection are handled strictly in order
//! - Nothing is retried; every error ends only this client's session
//! - Releasing the backend is detached from the client path

pub mod session;

use std::sync::Arc;

use axum::http::HeaderName;

use crate::backend::{BackendError, BackendPool, Connector, TcpConnector};
use crate::config::LimitsConfig;
use crate::http::HttpError;
use crate::stats::StatsTable;

pub use session::ProxySession;

/// Shared services handed to every session.
pub struct ProxyContext<C: Connector = TcpConnector> {
    pub pool: Arc<BackendPool<C>>,
    pub stats: Arc<StatsTable>,
    pub limits: LimitsConfig,
    /// Response header carrying the path's running byte total.
    pub stats_header: HeaderName,
}

impl<C: Connector> Clone for ProxyContext<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            stats: Arc::clone(&self.stats),
            limits: self.limits,
            stats_header: self.stats_header.clone(),
        }
    }
}

/// Why a session ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read client request: {0}")]
    ClientRead(#[source] HttpError),

    #[error("failed to acquire backend connection: {0}")]
    Acquire(#[source] BackendError),

    #[error("failed to forward request to backend: {0}")]
    BackendWrite(#[source] std::io::Error),

    #[error("failed to read backend response: {0}")]
    BackendRead(#[source] HttpError),

    #[error("failed to write response to client: {0}")]
    ClientWrite(#[source] std::io::Error),
}

impl SessionError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::ClientRead(_) => "client_read",
            SessionError::Acquire(_) => "acquire",
            SessionError::BackendWrite(_) => "backend_write",
            SessionError::BackendRead(_) => "backend_read",
            SessionError::ClientWrite(_) => "client_write",
        }
    }
}
