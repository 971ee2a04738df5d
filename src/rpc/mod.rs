//! Stats query endpoint.
//!
//! # Data Flow
//! ```text
//! POST /rpc {"method": "Proxy.Status"}  → handlers::call      → StatsSnapshot envelope
//! GET  /stats                           → handlers::get_stats → StatsSnapshot
//! ```
//!
//! # Design Decisions
//! - Served on its own listener, separate from proxied traffic
//! - Read-only; there is no way to reset the table

pub mod client;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::lifecycle::shutdown::signalled;
use crate::stats::StatsTable;
use self::handlers::{call, get_stats, RpcState};

pub use client::{RpcClientError, StatsClient};
pub use handlers::{RpcRequest, RpcResponse, STATUS_METHOD};

pub fn setup_rpc_router(stats: Arc<StatsTable>) -> Router {
    Router::new()
        .route("/rpc", post(call))
        .route("/stats", get(get_stats))
        .with_state(RpcState { stats })
        .layer(TraceLayer::new_for_http())
}

/// Serve the RPC router until `shutdown` fires.
pub async fn serve_rpc(
    listener: TcpListener,
    stats: Arc<StatsTable>,
    shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(address = ?listener.local_addr().ok(), "RPC server starting");

    axum::serve(listener, setup_rpc_router(stats))
        .with_graceful_shutdown(signalled(shutdown))
        .await?;

    tracing::info!("RPC server stopped");
    Ok(())
}
