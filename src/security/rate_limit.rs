//! Per-client token-bucket rate limiting.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Token bucket for one client.
#[derive(Debug, Clone)]
struct ClientBucket {
    /// Always within `[0, burst]`.
    tokens: f64,
    last_refill: Instant,
    /// Never moves backwards while the bucket is alive.
    last_seen: Instant,
}

impl ClientBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = self.last_refill.max(now);
        self.last_seen = self.last_seen.max(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Admission control keyed by client.
///
/// A single mutex guards the whole map; it is only held for the O(1)
/// bucket arithmetic or a sweep, never across I/O.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, ClientBucket>>,
    rate: f64,
    burst: f64,
    idle_ttl: Duration,
}

impl RateLimiter {
    /// `rate` tokens per second, at most `burst` banked.
    pub fn new(rate: f64, burst: u32, idle_ttl: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate,
            burst: f64::from(burst),
            idle_ttl,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size, config.idle_ttl())
    }

    /// Decide whether the client identified by `key` may proceed.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    fn admit_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bucket) = buckets.get_mut(key) {
            return bucket.try_acquire(self.burst, self.rate, now);
        }
        let mut bucket = ClientBucket::new(self.burst, now);
        let allowed = bucket.try_acquire(self.burst, self.rate, now);
        buckets.insert(key.to_string(), bucket);
        allowed
    }

    /// Drop every client idle for longer than the staleness window.
    /// Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    fn evict_idle_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= self.idle_ttl);
        metrics::record_tracked_clients(buckets.len());
        before - buckets.len()
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep idle clients every `interval` until `stop` resolves.
    pub fn spawn_janitor<F>(self: &Arc<Self>, interval: Duration, stop: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tokio::pin!(stop);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = limiter.evict_idle();
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = limiter.len(), "Evicted idle rate limit clients");
                        }
                    }
                    () = &mut stop => break,
                }
            }
            tracing::debug!("Rate limit janitor stopped");
        })
    }
}

/// The request carried no usable peer address.
#[derive(Debug, Error)]
#[error("unable to determine client address")]
pub struct ClientKeyError;

/// Key used to bucket a request: the peer IP.
pub fn client_key(request: &Request) -> Result<String, ClientKeyError> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .ok_or(ClientKeyError)
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = match client_key(&request) {
        Ok(key) => key,
        Err(err) => return ApiError::internal(err).into_response(),
    };

    if limiter.admit(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        ApiError::RateLimitExceeded.into_response()
    }
}
