#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the sift-ingest crate.
//!
//! Covers per-item failure isolation, whole-cycle failure recovery, panic
//! containment, the stop signal, idempotent re-ingestion, HTTP sources,
//! ingestion running alongside corpus reads, and fixed-delay pacing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sift_core::{SiftError, SiftResult, SourceDocument};
use sift_ingest::{
    Candidate, FailureStage, HttpSource, IngestionScheduler, SchedulerSettings, SourceFetcher,
    StaticSource,
};
use sift_memory::{Corpus, EmbeddingProvider, InMemoryCorpus, LocalEmbedding};
use tokio::sync::{watch, Notify};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn doc(id: &str, text: &str) -> SourceDocument {
    SourceDocument {
        id: id.to_string(),
        title: format!("Document {id}"),
        locator: format!("https://example.com/{id}"),
        text: text.to_string(),
    }
}

fn settings(delay: Duration) -> SchedulerSettings {
    SchedulerSettings {
        delay,
        item_timeout: Duration::from_secs(5),
    }
}

/// Embeds like [`LocalEmbedding`] but fails on any text containing "poison".
struct PoisonAwareEmbedder(LocalEmbedding);

#[async_trait]
impl EmbeddingProvider for PoisonAwareEmbedder {
    async fn embed(&self, text: &str) -> SiftResult<Vec<f32>> {
        if text.contains("poison") {
            return Err(SiftError::EmbeddingFailure("model rejected input".into()));
        }
        self.0.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }
}

/// Fails (or panics) on the first `bad_calls` fetches, then serves `docs`.
struct RecoveringSource {
    calls: AtomicUsize,
    bad_calls: usize,
    panic: bool,
    docs: Vec<SourceDocument>,
}

#[async_trait]
impl SourceFetcher for RecoveringSource {
    fn name(&self) -> &str {
        "recovering"
    }

    async fn fetch_candidates(&self) -> SiftResult<Vec<Candidate>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.bad_calls {
            if self.panic {
                panic!("parser blew up");
            }
            return Err(SiftError::Fetch("network unreachable".into()));
        }
        Ok(self.docs.iter().cloned().map(Ok).collect())
    }
}

fn scheduler(
    source: Arc<dyn SourceFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    corpus: Arc<dyn Corpus>,
    delay: Duration,
) -> Arc<IngestionScheduler> {
    Arc::new(IngestionScheduler::new(
        source,
        embedder,
        corpus,
        settings(delay),
    ))
}

// ---------------------------------------------------------------------------
// 1. A single failing document does not abort the cycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_of_three_fails_to_embed() {
    let corpus = Arc::new(InMemoryCorpus::new());
    let source = Arc::new(StaticSource::new(vec![
        doc("1", "first document"),
        doc("2", "poison pill"),
        doc("3", "third document"),
    ]));
    let scheduler = scheduler(
        source,
        Arc::new(PoisonAwareEmbedder(LocalEmbedding::new(64))),
        corpus.clone(),
        Duration::from_secs(60),
    );

    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(report.committed, vec!["1".to_string(), "3".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, "2");
    assert_eq!(report.failures[0].stage, FailureStage::Embed);

    assert_eq!(corpus.count().await.unwrap(), 2);
    assert!(corpus.get("1").await.unwrap().is_some());
    assert!(corpus.get("2").await.unwrap().is_none());
    assert!(corpus.get("3").await.unwrap().is_some());

    let stats = scheduler.stats();
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.documents_committed, 2);
    assert_eq!(stats.item_failures, 1);
}

// ---------------------------------------------------------------------------
// 2. Whole-cycle failures are counted and the loop keeps going
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_failure_does_not_stop_scheduler() {
    let corpus = Arc::new(InMemoryCorpus::new());
    let source = Arc::new(RecoveringSource {
        calls: AtomicUsize::new(0),
        bad_calls: 2,
        panic: false,
        docs: vec![doc("1", "hello world")],
    });
    let scheduler = scheduler(
        source,
        Arc::new(LocalEmbedding::new(64)),
        corpus.clone(),
        Duration::from_millis(5),
    );

    let (_stop_tx, stop_rx) = watch::channel(false);
    scheduler.clone().run(stop_rx, Some(3)).await;

    let stats = scheduler.stats();
    assert_eq!(stats.cycles_failed, 2);
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(corpus.count().await.unwrap(), 1);
}

#[tokio::test]
async fn panicking_cycle_is_contained() {
    let corpus = Arc::new(InMemoryCorpus::new());
    let source = Arc::new(RecoveringSource {
        calls: AtomicUsize::new(0),
        bad_calls: 1,
        panic: true,
        docs: vec![doc("1", "hello world")],
    });
    let scheduler = scheduler(
        source,
        Arc::new(LocalEmbedding::new(64)),
        corpus.clone(),
        Duration::from_millis(5),
    );

    let (_stop_tx, stop_rx) = watch::channel(false);
    scheduler.clone().run(stop_rx, Some(2)).await;

    assert_eq!(scheduler.stats().cycles_failed, 1);
    assert_eq!(scheduler.stats().cycles_completed, 1);
    assert_eq!(corpus.count().await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// 3. The stop signal interrupts the inter-cycle delay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_interrupts_delay() {
    let corpus = Arc::new(InMemoryCorpus::new());
    let scheduler = scheduler(
        Arc::new(StaticSource::new(vec![doc("1", "hello world")])),
        Arc::new(LocalEmbedding::new(64)),
        corpus.clone(),
        Duration::from_secs(3600),
    );

    let handle = scheduler.clone().spawn();
    for _ in 0..200 {
        if scheduler.stats().cycles_completed > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(scheduler.stats().cycles_completed, 1);

    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("scheduler should stop without waiting out the delay");
    assert_eq!(corpus.count().await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// 4. Re-ingestion replaces documents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_cycles_upsert() {
    let corpus = Arc::new(InMemoryCorpus::new());
    let scheduler = scheduler(
        Arc::new(StaticSource::new(vec![
            doc("1", "alpha text"),
            doc("2", "beta text"),
        ])),
        Arc::new(LocalEmbedding::new(64)),
        corpus.clone(),
        Duration::from_millis(1),
    );

    let first = scheduler.run_cycle().await.unwrap();
    let second = scheduler.run_cycle().await.unwrap();

    assert_eq!(first.replaced, 0);
    assert_eq!(second.replaced, 2);
    assert_eq!(second.cycle, 2);
    assert_eq!(corpus.count().await.unwrap(), 2);
    assert_eq!(scheduler.last_report().unwrap().cycle, 2);
}

// ---------------------------------------------------------------------------
// 5. HTTP source: per-URL failures are items, not cycle failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn http_source_mixed_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Rust Book\nOwnership and borrowing."))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "guide",
            "title": "Async Guide",
            "text": "futures and executors"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/plain", server.uri()),
        format!("{}/json", server.uri()),
        format!("{}/missing", server.uri()),
    ];
    let source = Arc::new(HttpSource::new(urls.clone(), Duration::from_secs(5)).unwrap());
    let corpus = Arc::new(InMemoryCorpus::new());
    let scheduler = scheduler(
        source,
        Arc::new(LocalEmbedding::new(64)),
        corpus.clone(),
        Duration::from_secs(60),
    );

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.committed.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, FailureStage::Fetch);
    assert_eq!(report.failures[0].source, urls[2]);

    let plain = corpus.get(&urls[0]).await.unwrap().unwrap();
    assert_eq!(plain.title, "Rust Book");
    let guide = corpus.get("guide").await.unwrap().unwrap();
    assert_eq!(guide.locator, urls[1]);
}

#[tokio::test]
async fn http_source_total_outage_fails_cycle() {
    // Nothing listens on port 1.
    let source = Arc::new(
        HttpSource::new(
            vec!["http://127.0.0.1:1/a".to_string(), "http://127.0.0.1:1/b".to_string()],
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let scheduler = scheduler(
        source,
        Arc::new(LocalEmbedding::new(64)),
        Arc::new(InMemoryCorpus::new()),
        Duration::from_secs(60),
    );
    assert!(matches!(
        scheduler.run_cycle().await,
        Err(SiftError::Fetch(_))
    ));
}

// ---------------------------------------------------------------------------
// 6. Corpus stays readable while ingestion is stalled mid-cycle
// ---------------------------------------------------------------------------

struct StalledEmbedder {
    inner: LocalEmbedding,
    release: Arc<Notify>,
}

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    async fn embed(&self, text: &str) -> SiftResult<Vec<f32>> {
        if text.contains("slow") {
            self.release.notified().await;
        }
        self.inner.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_proceed_during_ingestion() {
    let corpus = Arc::new(InMemoryCorpus::new());
    let release = Arc::new(Notify::new());
    let embedder = Arc::new(StalledEmbedder {
        inner: LocalEmbedding::new(64),
        release: release.clone(),
    });

    let scheduler = scheduler(
        Arc::new(StaticSource::new(vec![
            doc("1", "fast document"),
            doc("2", "slow document"),
        ])),
        embedder.clone(),
        corpus.clone(),
        Duration::from_secs(60),
    );
    let cycle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_cycle().await }
    });

    // Wait for the first document to land while the second is stalled.
    for _ in 0..200 {
        if corpus.count().await.unwrap() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let query = embedder.inner.embed("fast").await.unwrap();
    let hits = tokio::time::timeout(Duration::from_secs(1), corpus.search(&query, 5))
        .await
        .expect("search must not wait on ingestion")
        .unwrap();
    assert_eq!(hits.len(), 1);

    release.notify_one();
    let report = cycle.await.unwrap().unwrap();
    assert_eq!(report.committed.len(), 2);
}

// ---------------------------------------------------------------------------
// Fixed delay is measured from the end of the previous cycle
// ---------------------------------------------------------------------------

/// Takes `work` to fetch and records when each fetch began.
struct SlowSource {
    work: Duration,
    started: parking_lot::Mutex<Vec<tokio::time::Instant>>,
}

#[async_trait]
impl SourceFetcher for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn fetch_candidates(&self) -> SiftResult<Vec<Candidate>> {
        self.started.lock().push(tokio::time::Instant::now());
        tokio::time::sleep(self.work).await;
        Ok(vec![Ok(doc("1", "slow but steady"))])
    }
}

#[tokio::test(start_paused = true)]
async fn next_cycle_starts_delay_after_previous_finishes() {
    let source = Arc::new(SlowSource {
        work: Duration::from_secs(7),
        started: parking_lot::Mutex::new(Vec::new()),
    });
    let sched = scheduler(
        source.clone(),
        Arc::new(LocalEmbedding::new(64)),
        Arc::new(InMemoryCorpus::new()),
        Duration::from_secs(10),
    );

    let (_stop_tx, stop_rx) = watch::channel(false);
    sched.clone().run(stop_rx, Some(3)).await;

    let started = source.started.lock().clone();
    assert_eq!(started.len(), 3);
    for pair in started.windows(2) {
        // 7s of work plus the 10s delay, not a 10s tick.
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_secs(17) && gap < Duration::from_millis(17_050),
            "gap {gap:?}"
        );
    }
    assert_eq!(sched.stats().cycles_completed, 3);
}
