//! Admission control for the Sift search service.
//!
//! Provides the per-identity rate limiter that guards the query path and the
//! policy applied when its backend is unreachable.
//!
//! # Main types
//!
//! - [`RateLimiter`] — Trait for admission backends.
//! - [`FixedWindowLimiter`] — In-process fixed-window counter.
//! - [`Admission`] — Allowed / denied decision.
//! - [`FailurePolicy`] — Fail-closed (default) or fail-open on backend outage.

/// Backend outage policy.
pub mod policy;
/// Fixed-window rate limiting.
pub mod rate_limit;

pub use policy::FailurePolicy;
pub use rate_limit::{Admission, FixedWindowLimiter, RateLimiter};
