use crate::source::SourceFetcher;
use parking_lot::Mutex;
use serde::Serialize;
use sift_core::{CorpusDocument, SiftError, SiftResult, SourceDocument};
use sift_memory::{Corpus, EmbeddingProvider, Upsert};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Timing for [`IngestionScheduler`].
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Pause between the end of one cycle and the start of the next.
    pub delay: Duration,
    /// Upper bound on embedding or committing a single document.
    pub item_timeout: Duration,
}

/// Pipeline stage at which a document was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The source produced an unusable record.
    Fetch,
    /// The embedding provider failed or timed out.
    Embed,
    /// The corpus rejected the write.
    Commit,
}

/// A single document that was skipped during a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Document id, or the source position when no id could be read.
    pub source: String,
    /// Where in the pipeline it was dropped.
    pub stage: FailureStage,
    /// Rendered error.
    pub error: String,
}

/// What one ingestion cycle did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Records the source produced, good or bad.
    pub candidates: usize,
    /// Ids committed this cycle, in commit order.
    pub committed: Vec<String>,
    /// How many of the committed ids replaced an existing document.
    pub replaced: usize,
    /// Documents skipped this cycle.
    pub failures: Vec<ItemFailure>,
    /// Wall time from fetch start to last commit.
    pub duration_ms: u64,
}

/// Running totals across every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionStats {
    /// Cycles that reached the end of their candidate list.
    pub cycles_completed: u64,
    /// Cycles abandoned by a fetch failure or a panic.
    pub cycles_failed: u64,
    /// Upserts that succeeded, replacements included.
    pub documents_committed: u64,
    /// Documents skipped across all cycles.
    pub item_failures: u64,
}

#[derive(Default)]
struct Counters {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    documents_committed: AtomicU64,
    item_failures: AtomicU64,
}

/// Background task that keeps the corpus populated.
///
/// Each cycle fetches candidates, embeds them one at a time and upserts them.
/// A failing document is recorded and skipped; a failing cycle (including a
/// panic inside it) is logged and counted, and the next cycle still runs.
pub struct IngestionScheduler {
    source: Arc<dyn SourceFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    corpus: Arc<dyn Corpus>,
    settings: SchedulerSettings,
    counters: Counters,
    last_report: Mutex<Option<CycleReport>>,
}

/// Handle to a running scheduler.
///
/// Dropping the handle also stops the scheduler, after its current cycle.
pub struct IngestionHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl IngestionHandle {
    /// Signal the scheduler to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Ingestion task ended abnormally");
        }
    }

    /// Returns true once the scheduler loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl IngestionScheduler {
    /// Create a scheduler. Nothing runs until [`spawn`](Self::spawn) or
    /// [`run_cycle`](Self::run_cycle) is called.
    pub fn new(
        source: Arc<dyn SourceFetcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn Corpus>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            source,
            embedder,
            corpus,
            settings,
            counters: Counters::default(),
            last_report: Mutex::new(None),
        }
    }

    /// Start the scheduler loop on the tokio runtime. Runs until stopped.
    pub fn spawn(self: Arc<Self>) -> IngestionHandle {
        self.spawn_bounded(None)
    }

    /// Start the scheduler loop, exiting on its own after `max_cycles` if set.
    pub fn spawn_bounded(self: Arc<Self>, max_cycles: Option<u64>) -> IngestionHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(stop_rx, max_cycles).await });
        IngestionHandle { stop_tx, task }
    }

    /// Run cycles until `stop` flips to true (or its sender is dropped), or
    /// until `max_cycles` cycles have run.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>, max_cycles: Option<u64>) {
        info!(
            source = self.source.name(),
            delay_ms = self.settings.delay.as_millis() as u64,
            "Ingestion scheduler started"
        );

        let mut cycles = 0u64;
        loop {
            if *stop.borrow() {
                break;
            }

            // Each cycle runs in its own task so that a panic is contained.
            let this = Arc::clone(&self);
            match tokio::spawn(async move { this.run_cycle().await }).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.counters.cycles_failed.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, "Ingestion cycle failed");
                }
                Err(e) => {
                    self.counters.cycles_failed.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, "Ingestion cycle panicked");
                }
            }

            cycles += 1;
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.delay) => {}
                _ = stop.changed() => break,
            }
        }

        info!(cycles, "Ingestion scheduler stopped");
    }

    /// Run one fetch → embed → commit cycle.
    ///
    /// Returns `Err` only when the fetch as a whole fails.
    pub async fn run_cycle(&self) -> SiftResult<CycleReport> {
        let cycle = self.counters.cycles_started.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();

        let candidates = self.source.fetch_candidates().await?;

        let mut report = CycleReport {
            cycle,
            candidates: candidates.len(),
            committed: Vec::new(),
            replaced: 0,
            failures: Vec::new(),
            duration_ms: 0,
        };

        for candidate in candidates {
            match candidate {
                Ok(doc) => match self.ingest_one(doc).await {
                    Ok((id, upsert)) => {
                        if upsert == Upsert::Replaced {
                            report.replaced += 1;
                        }
                        report.committed.push(id);
                    }
                    Err(failure) => report.failures.push(failure),
                },
                Err(fetch) => report.failures.push(ItemFailure {
                    source: fetch.source,
                    stage: FailureStage::Fetch,
                    error: fetch.error.to_string(),
                }),
            }
        }

        for failure in &report.failures {
            warn!(
                cycle,
                source = %failure.source,
                stage = ?failure.stage,
                error = %failure.error,
                "Skipped document"
            );
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        self.counters.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.counters
            .documents_committed
            .fetch_add(report.committed.len() as u64, Ordering::Relaxed);
        self.counters
            .item_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);

        info!(
            cycle,
            candidates = report.candidates,
            committed = report.committed.len(),
            replaced = report.replaced,
            failed = report.failures.len(),
            duration_ms = report.duration_ms,
            "Ingestion cycle complete"
        );

        *self.last_report.lock() = Some(report.clone());
        Ok(report)
    }

    async fn ingest_one(&self, doc: SourceDocument) -> Result<(String, Upsert), ItemFailure> {
        let source = doc.id.clone();
        let fail = |stage, error: SiftError| ItemFailure {
            source: source.clone(),
            stage,
            error: error.to_string(),
        };

        if doc.id.trim().is_empty() {
            return Err(fail(
                FailureStage::Fetch,
                SiftError::InvalidInput("document id is empty".to_string()),
            ));
        }

        let timeout = self.settings.item_timeout;
        let embedding = tokio::time::timeout(timeout, self.embedder.embed(&doc.text))
            .await
            .map_err(|_| fail(FailureStage::Embed, SiftError::Timeout(timeout)))?
            .map_err(|e| fail(FailureStage::Embed, e))?;

        let document = CorpusDocument::from_source(doc, embedding);
        let upsert = tokio::time::timeout(timeout, self.corpus.upsert(document))
            .await
            .map_err(|_| fail(FailureStage::Commit, SiftError::Timeout(timeout)))?
            .map_err(|e| fail(FailureStage::Commit, e))?;

        Ok((source.clone(), upsert))
    }

    /// Totals since the scheduler was created.
    pub fn stats(&self) -> IngestionStats {
        IngestionStats {
            cycles_completed: self.counters.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.counters.cycles_failed.load(Ordering::Relaxed),
            documents_committed: self.counters.documents_committed.load(Ordering::Relaxed),
            item_failures: self.counters.item_failures.load(Ordering::Relaxed),
        }
    }

    /// Report of the most recent completed cycle.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().clone()
    }
}
