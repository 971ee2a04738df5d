//! tally-proxy
//!
//! Forwards HTTP/1.x traffic to a single backend and counts response bytes
//! per request path.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                   TALLY PROXY                    │
//!                      │                                                  │
//!   Client Request     │  ┌─────────┐    ┌──────────────┐    ┌─────────┐  │
//!   ───────────────────┼─▶│   net   │───▶│    proxy     │───▶│ backend │──┼──▶ Backend
//!                      │  │listener │    │   session    │    │  pool   │  │    Server
//!   Client Response    │  └─────────┘    │  (http/1.x   │    └─────────┘  │
//!   ◀──────────────────┼─────────────────│   codec)     │◀─────────────────┼───
//!   + X-Bytes header   │                 └──────┬───────┘                 │
//!                      │                        │ update(path, bytes)     │
//!                      │                        ▼                         │
//!   Stats query        │  ┌─────────┐    ┌──────────────┐                 │
//!   ───────────────────┼─▶│   rpc   │───▶│    stats     │                 │
//!                      │  └─────────┘    │    table     │                 │
//!                      │                 └──────────────┘                 │
//!                      │                                                  │
//!                      │  config · observability · lifecycle · origin     │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tally_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use tally_proxy::lifecycle::{spawn_signal_watcher, App, Shutdown};
use tally_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "tally-proxy")]
#[command(about = "HTTP/1.x forwarding proxy with per-path byte accounting", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    listen: Option<String>,

    /// Override `backend.address`.
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listener.bind_address = listen;
    }
    if let Some(backend) = args.backend {
        config.backend.address = backend;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address,
        pool_capacity = config.pool.capacity,
        rpc_enabled = config.rpc.enabled,
        origin_enabled = config.origin.enabled,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    spawn_signal_watcher(shutdown.clone());

    let app = App::bind(&config).await?;
    app.run(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
