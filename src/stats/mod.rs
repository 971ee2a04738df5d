//! Per-path response byte accounting.
//!
//! # Data Flow
//! ```text
//! ProxySession (after each backend response)
//!     → table.rs update(path, body bytes) → running total
//!     → total written into the response header
//!
//! rpc::handlers (out of band)
//!     → table.rs snapshot() → StatsSnapshot → JSON
//! ```
//!
//! # Design Decisions
//! - Keyed by URL path only; method and query string are ignored
//! - One exclusive lock for writers and snapshotting readers
//! - Never reset; totals live as long as the process

pub mod table;

pub use table::{StatsSnapshot, StatsTable};
