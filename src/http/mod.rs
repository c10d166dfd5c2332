//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → middleware/ (panic recovery, authentication)
//!     → context.rs (identity attached to the request)
//!     → foods.rs / healthcheck.rs (handlers)
//!     → request.rs (ids, query strings, JSON bodies)
//!     → response.rs (envelopes, error taxonomy)
//!     → Send to client
//! ```

pub mod context;
pub mod foods;
pub mod healthcheck;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use context::CurrentIdentity;
pub use request::{UuidRequestId, X_EXPECTED_VERSION, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{ApiServer, AppState};
