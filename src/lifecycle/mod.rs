//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ShutdownCoordinator::trigger
//!
//! Shutdown (shutdown.rs):
//!     Running → Draining (stop accepting) → Stopped (drained or deadline)
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a deadline: in-flight work is abandoned after it

pub mod shutdown;
pub mod signals;

pub use shutdown::{ServerState, ShutdownCause, ShutdownCoordinator, ShutdownError};
pub use signals::{shutdown_signal, spawn_signal_listener};
