//! Core types and error definitions for the Sift search service.
//!
//! This crate provides the foundational types shared across all Sift crates:
//! the error taxonomy, the records that flow between the query path and the
//! ingestion path, query fingerprinting, and the clock abstraction used for
//! every time-dependent decision.
//!
//! # Main types
//!
//! - [`SiftError`] — Unified error enum for all Sift subsystems.
//! - [`SiftResult`] — Convenience alias for `Result<T, SiftError>`.
//! - [`ResultRecord`] — A single ranked search hit.
//! - [`CorpusDocument`] — An embedded document stored in the corpus.
//! - [`SourceDocument`] — A raw document produced by a source fetcher.
//! - [`QueryFingerprint`] — Deterministic cache key for a query.
//! - [`Clock`] — Source of monotonic time ([`SystemClock`], [`ManualClock`]).

/// Monotonic time sources.
pub mod clock;
/// Query fingerprinting.
pub mod fingerprint;
/// Records shared between the query and ingestion paths.
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::QueryFingerprint;
pub use types::{CorpusDocument, ResultRecord, SourceDocument};

use std::time::Duration;

// --- Error types ---

/// Top-level error type for the Sift service.
///
/// Variants map onto the failure classes the request surface distinguishes:
/// caller errors, admission rejections, backend faults and ingestion faults.
#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    /// The caller supplied an empty query, a non-positive `top_k`, or similar.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller exceeded its per-window request budget.
    #[error("Rate limited: retry after {retry_after:?}")]
    RateLimited {
        /// Time until the caller's current window ends.
        retry_after: Duration,
    },

    /// A cache or rate-limit backend could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The search delegate failed.
    #[error("Search delegate unavailable: {0}")]
    DelegateUnavailable(String),

    /// The embedding provider could not produce a vector.
    #[error("Embedding failure: {0}")]
    EmbeddingFailure(String),

    /// A source fetch failed.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The corpus rejected or could not persist a write.
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// An operation did not finish within its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiftError {
    /// Returns true for errors the caller can correct (4xx-class).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::RateLimited { .. })
    }

    /// Returns true for backend faults that are worth retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_)
                | Self::DelegateUnavailable(_)
                | Self::EmbeddingFailure(_)
                | Self::Timeout(_)
        )
    }
}

/// A convenience `Result` alias using [`SiftError`].
pub type SiftResult<T> = Result<T, SiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(SiftError::InvalidInput("empty".into()).is_client_error());
        assert!(SiftError::RateLimited {
            retry_after: Duration::from_secs(1)
        }
        .is_client_error());
        assert!(!SiftError::StoreUnavailable("down".into()).is_client_error());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SiftError::DelegateUnavailable("down".into()).is_retryable());
        assert!(SiftError::Timeout(Duration::from_millis(10)).is_retryable());
        assert!(!SiftError::InvalidInput("bad".into()).is_retryable());
        assert!(!SiftError::Config("bad".into()).is_retryable());
    }
}
