//! Transparent HTTP/1.x forwarding proxy with per-path response byte accounting.

// Core subsystems
pub mod backend;
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;
pub mod stats;

// Side services
pub mod origin;
pub mod rpc;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::{App, Shutdown};
pub use stats::{StatsSnapshot, StatsTable};
