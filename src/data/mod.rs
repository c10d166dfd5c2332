//! Data subsystem.
//!
//! # Data Flow
//! ```text
//! Handler
//!     → optimistic.rs (read, mutate, version-checked write)
//!     → store.rs (FoodStore contract, deadlines)
//!     → sqlite.rs (SQL, token lookups)
//! ```
//!
//! # Design Decisions
//! - Handlers only see the `FoodStore` trait
//! - Existing rows are only modified through the conditional write
//! - Validation lives next to the model it validates

pub mod filters;
pub mod foods;
pub mod optimistic;
pub mod sqlite;
pub mod store;

pub use filters::{FoodFilter, Filters, Metadata};
pub use foods::{Food, FoodPatch, NewFood};
pub use optimistic::UpdateError;
pub use sqlite::SqliteStore;
pub use store::{FoodStore, StoreError};
