//! Request middleware.
//!
//! Order on the way in (outermost first):
//! ```text
//! recover.rs (PanicGuard) → rate limit → authenticate.rs → handler
//! ```

pub mod authenticate;
pub mod recover;

pub use authenticate::authenticate;
pub use recover::recover_panics;
