//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket)
//!     → identity.rs (bearer token → Identity with permissions)
//!     → Pass to handlers, which check permissions
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unusable credential is rejected, never downgraded
//! - Tokens are only ever stored hashed
//! - No trust in client input

pub mod identity;
pub mod rate_limit;

pub use identity::{AccessError, Identity, IdentityResolver};
pub use rate_limit::RateLimiter;
