//! Time-bounded result cache for the Sift search service.
//!
//! # Main types
//!
//! - [`CacheStore`] — Trait for TTL key/value backends.
//! - [`InMemoryCacheStore`] — Sharded in-process implementation.
//! - [`CacheSettings`] — Eviction bounds for the in-memory store.

/// In-memory TTL store.
pub mod memory;

pub use memory::{CacheSettings, InMemoryCacheStore};

use async_trait::async_trait;
use sift_core::SiftResult;
use std::time::Duration;

/// Trait for TTL cache backends.
///
/// An expired entry is a miss, never an error. Errors are reserved for an
/// unreachable backend and surface as [`sift_core::SiftError::StoreUnavailable`].
#[async_trait]
pub trait CacheStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Return the value for `key` if it was written less than its TTL ago.
    async fn get(&self, key: &str) -> SiftResult<Option<V>>;

    /// Store `value` under `key`, replacing any entry and restarting its TTL.
    async fn put(&self, key: &str, value: V, ttl: Duration) -> SiftResult<()>;
}
