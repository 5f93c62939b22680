//! Request orchestration for the Sift search service.
//!
//! Composes admission control, result caching and the search delegate into a
//! single query flow.
//!
//! # Main types
//!
//! - [`QueryOrchestrator`] — Runs one query through limiter, cache and search.
//! - [`QuerySettings`] — Limits and deadlines, all supplied by the caller.
//! - [`QueryResponse`] — Results plus whether they came from the cache.

/// The query flow.
pub mod orchestrator;

pub use orchestrator::{QueryOrchestrator, QueryResponse, QuerySettings, ResultCache};
