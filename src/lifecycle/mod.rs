//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → bind origin, RPC, proxy listeners → metrics → run all
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain sessions → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: every listener is bound before any traffic is served
//! - All listeners run concurrently; the first one to fail stops the rest
//! - Shutdown has timeout: sessions still open after the drain deadline are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_watcher, wait_for_signal};
pub use startup::{App, StartupError};
