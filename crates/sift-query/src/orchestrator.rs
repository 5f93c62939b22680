use serde::Serialize;
use sift_cache::CacheStore;
use sift_core::{QueryFingerprint, ResultRecord, SiftError, SiftResult};
use sift_memory::SearchDelegate;
use sift_security::{Admission, FailurePolicy, RateLimiter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache backend holding ranked results per query fingerprint.
pub type ResultCache = dyn CacheStore<Vec<ResultRecord>>;

/// Everything the orchestrator needs to know about limits and deadlines.
#[derive(Debug, Clone, Copy)]
pub struct QuerySettings {
    /// How long a computed result stays servable from the cache.
    pub cache_ttl: Duration,
    /// Requests admitted per identity per window.
    pub rate_limit: u32,
    /// Length of one rate-limit window.
    pub rate_window: Duration,
    /// What to do when the limiter backend cannot answer.
    pub limiter_failure: FailurePolicy,
    /// Largest `top_k` a caller may ask for.
    pub max_top_k: usize,
    /// Deadline for the whole request: admission, cache and search.
    pub request_timeout: Duration,
    /// Deadline for any single backend call.
    pub backend_timeout: Duration,
}

/// Successful answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    /// Ranked results, best first.
    pub results: Vec<ResultRecord>,
    /// True when the delegate was not consulted.
    pub served_from_cache: bool,
}

/// Stateless coordinator over the rate limiter, the result cache and the
/// search delegate.
///
/// A rejected request never reaches the cache or the delegate. A cache hit
/// never reaches the delegate. Only a miss writes to the cache, and only
/// after the delegate has answered within the deadline.
pub struct QueryOrchestrator {
    limiter: Arc<dyn RateLimiter>,
    cache: Arc<ResultCache>,
    delegate: Arc<dyn SearchDelegate>,
    settings: QuerySettings,
}

impl QueryOrchestrator {
    /// Wire the orchestrator to its three backends.
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        cache: Arc<ResultCache>,
        delegate: Arc<dyn SearchDelegate>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            limiter,
            cache,
            delegate,
            settings,
        }
    }

    /// Settings this orchestrator was built with.
    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Answer `query_text` for `identity` with up to `top_k` results.
    pub async fn handle_query(
        &self,
        identity: &str,
        query_text: &str,
        top_k: usize,
    ) -> SiftResult<QueryResponse> {
        self.validate(query_text, top_k)?;
        let fingerprint = QueryFingerprint::new(query_text, top_k);

        let deadline = self.settings.request_timeout;
        let answer = self.admit_and_answer(identity, query_text, top_k, &fingerprint);
        match tokio::time::timeout(deadline, answer).await {
            Ok(result) => result,
            Err(_) => {
                warn!(identity, fingerprint = %fingerprint, "Query exceeded its deadline");
                Err(SiftError::Timeout(deadline))
            }
        }
    }

    fn validate(&self, query_text: &str, top_k: usize) -> SiftResult<()> {
        if query_text.trim().is_empty() {
            return Err(SiftError::InvalidInput(
                "query text must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(SiftError::InvalidInput(
                "top_k must be positive".to_string(),
            ));
        }
        if top_k > self.settings.max_top_k {
            return Err(SiftError::InvalidInput(format!(
                "top_k must be at most {}",
                self.settings.max_top_k
            )));
        }
        Ok(())
    }

    async fn admit_and_answer(
        &self,
        identity: &str,
        query_text: &str,
        top_k: usize,
        fingerprint: &QueryFingerprint,
    ) -> SiftResult<QueryResponse> {
        let checked = self
            .bounded(self.limiter.allow(
                identity,
                self.settings.rate_limit,
                self.settings.rate_window,
            ))
            .await;
        match self.settings.limiter_failure.resolve(identity, checked)? {
            Admission::Allowed { remaining } => {
                debug!(identity, remaining, "Request admitted");
            }
            Admission::Denied { retry_after } => {
                debug!(identity, ?retry_after, "Request rate limited");
                return Err(SiftError::RateLimited { retry_after });
            }
        }

        // Cache faults degrade to a miss.
        match self.bounded(self.cache.get(fingerprint.as_str())).await {
            Ok(Some(results)) => {
                debug!(fingerprint = %fingerprint, "Cache hit");
                return Ok(QueryResponse {
                    results,
                    served_from_cache: true,
                });
            }
            Ok(None) => debug!(fingerprint = %fingerprint, "Cache miss"),
            Err(e) => warn!(error = %e, "Cache lookup failed, recomputing"),
        }

        let results = self
            .bounded(self.delegate.search(query_text, top_k))
            .await
            .map_err(|e| match e {
                SiftError::Timeout(_) | SiftError::DelegateUnavailable(_) => e,
                other => SiftError::DelegateUnavailable(other.to_string()),
            })?;

        if let Err(e) = self
            .bounded(self.cache.put(
                fingerprint.as_str(),
                results.clone(),
                self.settings.cache_ttl,
            ))
            .await
        {
            warn!(error = %e, "Cache write failed, result not cached");
        }

        Ok(QueryResponse {
            results,
            served_from_cache: false,
        })
    }

    async fn bounded<T>(&self, call: impl Future<Output = SiftResult<T>>) -> SiftResult<T> {
        let limit = self.settings.backend_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(SiftError::Timeout(limit)))
    }
}
