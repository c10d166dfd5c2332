//! Foods API Library
//!
//! A JSON HTTP service exposing create, read, update, delete and list over a
//! catalogue of foods, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ net (listener) ──▶ http (server, middleware stack)
//!                                   │
//!                                   ├─ security: rate limit, identity
//!                                   ├─ handlers ──▶ data (optimistic update, store)
//!                                   │
//!     Client Response ◀─────────────┘
//!
//!     Cross-cutting: config, observability, lifecycle (signals, drain)
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::ApiConfig;
pub use http::ApiServer;
pub use lifecycle::ShutdownCoordinator;
