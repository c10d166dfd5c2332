//! Data-access seam for the food resource.
//!
//! # Responsibilities
//! - Define the store contract handlers and the update guard depend on
//! - Classify store failures (missing row, lost race, infrastructure)
//! - Bound every call with a deadline
//!
//! # Design Decisions
//! - Writes to an existing row only go through `conditional_update`
//! - Failures are never retried here; callers decide
//! - A deadline expiry is an infrastructure failure, not a conflict
//! - A deadline abandons the wait, not the work: blocking database calls
//!   cannot be cancelled, so a write that times out may still commit after
//!   the client was told it failed. Its outcome is unknown, which is one more
//!   reason it is not retried

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::data::filters::{FoodFilter, Filters, Metadata};
use crate::data::foods::{Food, NewFood};

/// Errors returned by a [`FoodStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with the requested id.
    #[error("record not found")]
    RecordNotFound,

    /// The conditional write matched zero rows: someone else changed the
    /// record since it was read.
    #[error("edit conflict")]
    EditConflict,

    /// The call did not finish before its deadline.
    #[error("store call exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store worker failed: {0}")]
    Worker(String),
}

/// Persistence operations for foods.
#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Food, StoreError>;

    async fn insert(&self, food: NewFood) -> Result<Food, StoreError>;

    /// Write `food`'s fields only if the stored version still equals
    /// `food.version`, bumping the version in the same statement.
    ///
    /// Returns the new version, or [`StoreError::EditConflict`] when no row
    /// matched.
    async fn conditional_update(&self, food: &Food) -> Result<i32, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn list(
        &self,
        filter: &FoodFilter,
        filters: &Filters,
    ) -> Result<(Vec<Food>, Metadata), StoreError>;
}

/// Run `call` under `deadline`, mapping expiry to [`StoreError::Timeout`].
///
/// Expiry drops `call`; any blocking task it spawned keeps running.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline = ?deadline, "Store call timed out");
            Err(StoreError::Timeout(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_reported() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, StoreError>(1)
        };
        let result = with_deadline(Duration::from_secs(3), slow).await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn expired_blocking_work_still_completes() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let committed = Arc::new(AtomicBool::new(false));
        let work = {
            let committed = Arc::clone(&committed);
            async move {
                tokio::task::spawn_blocking(move || {
                    std::thread::sleep(Duration::from_millis(200));
                    committed.store(true, Ordering::SeqCst);
                })
                .await
                .map_err(|e| StoreError::Worker(e.to_string()))
            }
        };

        let result = with_deadline(Duration::from_millis(20), work).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert!(!committed.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(committed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let result = with_deadline(Duration::from_secs(3), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);

        let err = with_deadline(Duration::from_secs(3), async {
            Err::<i32, _>(StoreError::RecordNotFound)
        })
        .await;
        assert!(matches!(err, Err(StoreError::RecordNotFound)));
    }
}
