//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind)
//!     → Hand off to HTTP layer
//!     → connection.rs (in-flight tracking per request)
//! ```
//!
//! # Design Decisions
//! - Every request is tracked so shutdown can report unfinished work

pub mod connection;
pub mod listener;

pub use connection::{track_in_flight, InFlightGuard, InFlightTracker};
pub use listener::{bind, ListenerError};
