//! Optimistic concurrency for read-modify-write updates.
//!
//! # Protocol
//! ```text
//! load(id)                      → NotFound if absent
//! check expected version        → Conflict if the caller's precondition is stale
//! mutate an in-memory copy      → Invalid if the result fails validation
//! conditional write(version)    → Conflict if zero rows matched
//!                               → new version (= old + 1) otherwise
//! ```
//!
//! # Design Decisions
//! - Conflicts are surfaced, never retried: a retry would re-apply an
//!   intent computed against a state that no longer exists
//! - Without a caller-supplied version, the version read just before the
//!   mutation is used. This narrows the race window but does not close it:
//!   a write committed between our read and our conditional write is still
//!   detected, one committed before our read is silently built upon

use thiserror::Error;
use validator::ValidationErrors;

use crate::data::foods::Food;
use crate::data::store::{FoodStore, StoreError};

/// Outcomes of a guarded update other than success.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("record not found")]
    NotFound,

    /// The record changed since the caller (or this guard) read it.
    #[error("edit conflict: expected version {expected}")]
    Conflict { expected: i32 },

    /// The mutation produced a record that fails validation.
    #[error("invalid update")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for UpdateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound => UpdateError::NotFound,
            other => UpdateError::Store(other),
        }
    }
}

/// Apply `mutate` to record `id` if nobody else has modified it.
///
/// `expected_version` is the version the caller last saw, when it has one.
/// On success the returned food carries the new version.
pub async fn update<S, F>(
    store: &S,
    id: i64,
    expected_version: Option<i32>,
    mutate: F,
) -> Result<Food, UpdateError>
where
    S: FoodStore + ?Sized,
    F: FnOnce(&mut Food),
{
    let mut food = store.get(id).await?;

    let expected = expected_version.unwrap_or(food.version);
    if food.version != expected {
        tracing::debug!(id, expected, found = food.version, "Stale expected version");
        return Err(UpdateError::Conflict { expected });
    }

    mutate(&mut food);
    // The mutation must not be able to move the version it is checked against.
    food.id = id;
    food.version = expected;
    food.validate().map_err(UpdateError::Invalid)?;

    match store.conditional_update(&food).await {
        Ok(version) => {
            food.version = version;
            Ok(food)
        }
        Err(StoreError::EditConflict) => {
            tracing::debug!(id, expected, "Conditional write matched no rows");
            Err(UpdateError::Conflict { expected })
        }
        Err(err) => Err(err.into()),
    }
}
