use async_trait::async_trait;
use dashmap::DashMap;
use sift_core::{Clock, SiftResult, SystemClock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fits in the caller's current window.
    Allowed {
        /// Slots left in the current window after this request.
        remaining: u32,
    },
    /// The caller's window is full.
    Denied {
        /// Time until the current window ends.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns true if the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Trait for per-identity admission backends.
///
/// Errors mean the backend itself is unreachable; what to do about that is
/// decided by [`crate::FailurePolicy`], not by the backend.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `identity` against `limit` requests per `window`.
    async fn allow(&self, identity: &str, limit: u32, window: Duration) -> SiftResult<Admission>;
}

struct Counter {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl Counter {
    fn window_elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window
    }
}

/// Fixed-window request counter per identity.
///
/// Counters live in a sharded map; the read-modify-write for one identity runs
/// under its shard's write lock, so two concurrent calls for the same identity
/// can never both take the last slot. A window that has fully elapsed is
/// indistinguishable from an absent counter, which is what
/// [`FixedWindowLimiter::cleanup`] relies on.
pub struct FixedWindowLimiter {
    counters: DashMap<String, Counter>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    /// Create a limiter driven by the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
        }
    }

    /// Create a limiter driven by the wall clock.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Remove counters whose window has elapsed. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, c| !c.window_elapsed(now));
        before.saturating_sub(self.counters.len())
    }

    /// Number of tracked identities.
    pub fn tracked(&self) -> usize {
        self.counters.len()
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn allow(&self, identity: &str, limit: u32, window: Duration) -> SiftResult<Admission> {
        let now = self.clock.now();
        if limit == 0 {
            return Ok(Admission::Denied {
                retry_after: window,
            });
        }

        let mut counter = self
            .counters
            .entry(identity.to_string())
            .or_insert_with(|| Counter {
                count: 0,
                window_start: now,
                window,
            });

        // The boundary instant belongs to the new window.
        if counter.count == 0 || counter.window_elapsed(now) {
            counter.count = 1;
            counter.window_start = now;
            counter.window = window;
            return Ok(Admission::Allowed {
                remaining: limit - 1,
            });
        }

        if counter.count < limit {
            counter.count += 1;
            return Ok(Admission::Allowed {
                remaining: limit - counter.count,
            });
        }

        let retry_after = counter
            .window
            .saturating_sub(now.saturating_duration_since(counter.window_start));
        Ok(Admission::Denied { retry_after })
    }
}
