//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently executing
//! - Let the shutdown path wait for, or report on, unfinished work
//! - Record per-request metrics on completion
//!
//! # Design Decisions
//! - The count lives in a watch channel so waiters wake on every change
//!   instead of polling
//! - A guard decrements on drop, so cancelled and panicking requests are
//!   released too

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tokio::sync::watch;

use crate::observability::metrics;

/// Tracks requests in flight for graceful shutdown.
#[derive(Debug, Clone)]
pub struct InFlightTracker {
    count: Arc<watch::Sender<usize>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Record a new request. Returns a guard that releases it on drop.
    pub fn track(&self) -> InFlightGuard {
        let mut current = 0;
        self.count.send_modify(|count| {
            *count += 1;
            current = *count;
        });
        metrics::record_in_flight(current);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Requests currently executing.
    pub fn in_flight(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolve once no request is executing.
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        loop {
            if *rx.borrow_and_update() == 0 {
                return;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one in-flight request.
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut current = 0;
        self.count.send_modify(|count| {
            *count = count.saturating_sub(1);
            current = *count;
        });
        metrics::record_in_flight(current);
    }
}

/// Middleware that counts the request as in flight until its response is
/// produced, then records request metrics.
pub async fn track_in_flight(
    State(tracker): State<InFlightTracker>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = tracker.track();
    let start = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;

    metrics::record_request(&method, response.status(), start);
    response
}
