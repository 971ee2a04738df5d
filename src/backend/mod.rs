//! Backend connection subsystem.
//!
//! # Data Flow
//! ```text
//! ProxySession needs a backend
//!     → pool.rs acquire (idle connection within timeout, else dial)
//!     → connection.rs (send request, receive response)
//!     → release.rs (spawned hand-back; pool keeps it or closes it)
//!     → or pool.rs discard on any error
//! ```
//!
//! # Design Decisions
//! - One fixed backend; no selection, no health state
//! - Fixed capacity; overflow is closed rather than queued
//! - Connections are owned by exactly one session while in use

pub mod connection;
pub mod pool;
pub mod release;

pub use connection::{BackendConnection, Connector, TcpConnector};
pub use pool::{BackendPool, ReleaseOutcome};
pub use release::spawn_release;

/// Errors from obtaining a backend connection.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to connect to backend {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },
}
