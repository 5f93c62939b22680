//! Background ingestion for the Sift search service.
//!
//! Fetches source documents, embeds them and upserts them into the corpus on
//! a fixed delay, independently of query traffic.
//!
//! # Main types
//!
//! - [`SourceFetcher`] — Trait for document producers.
//! - [`StaticSource`], [`FileSource`], [`HttpSource`], [`CompositeSource`] — Fetchers.
//! - [`IngestionScheduler`] — The periodic fetch → embed → commit loop.
//! - [`IngestionHandle`] — Stop signal and join handle for a running scheduler.
//! - [`CycleReport`] / [`ItemFailure`] — Typed per-cycle outcome.

/// Periodic ingestion loop.
pub mod scheduler;
/// Source fetchers.
pub mod source;

pub use scheduler::{
    CycleReport, FailureStage, IngestionHandle, IngestionScheduler, IngestionStats, ItemFailure,
    SchedulerSettings,
};
pub use source::{
    Candidate, CompositeSource, FetchFailure, FileSource, HttpSource, SourceFetcher, StaticSource,
};
