use crate::config::{EmbeddingConfig, SiftConfig, SourceConfig};
use sift_cache::InMemoryCacheStore;
use sift_core::{ResultRecord, SiftError, SiftResult};
use sift_ingest::{CompositeSource, FileSource, HttpSource, SourceFetcher, StaticSource};
use sift_memory::{Corpus, EmbeddingProvider, FileCorpus, InMemoryCorpus, LocalEmbedding, RemoteEmbedding};
use sift_security::FixedWindowLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub fn build_embedder(config: &EmbeddingConfig) -> SiftResult<Arc<dyn EmbeddingProvider>> {
    match config {
        EmbeddingConfig::Local { dimension } => {
            info!(dimension, "Using local hashed embeddings");
            Ok(Arc::new(LocalEmbedding::new(*dimension)))
        }
        EmbeddingConfig::Remote {
            url,
            model,
            api_key_env,
            dimension,
            timeout_ms,
        } => {
            let api_key = match api_key_env {
                Some(var) => Some(std::env::var(var).map_err(|_| {
                    SiftError::Config(format!("Environment variable {var} is not set"))
                })?),
                None => None,
            };
            info!(url, model, dimension, "Using remote embeddings");
            Ok(Arc::new(RemoteEmbedding::new(
                url.clone(),
                model.clone(),
                api_key,
                *dimension,
                Duration::from_millis(*timeout_ms),
            )?))
        }
    }
}

pub async fn build_corpus(config: &SiftConfig) -> SiftResult<Arc<dyn Corpus>> {
    match &config.corpus.path {
        Some(path) => {
            let corpus = FileCorpus::open(path.clone()).await?;
            info!(path = %path.display(), documents = corpus.count().await?, "Corpus loaded");
            Ok(Arc::new(corpus))
        }
        None => {
            info!("Using in-memory corpus");
            Ok(Arc::new(InMemoryCorpus::new()))
        }
    }
}

pub fn build_source(sources: &[SourceConfig]) -> SiftResult<Arc<dyn SourceFetcher>> {
    let mut built: Vec<Arc<dyn SourceFetcher>> = Vec::with_capacity(sources.len());
    for source in sources {
        let fetcher: Arc<dyn SourceFetcher> = match source {
            SourceConfig::File { path } => Arc::new(FileSource::new(path.clone())),
            SourceConfig::Http { urls, timeout_ms } => Arc::new(HttpSource::new(
                urls.clone(),
                Duration::from_millis(*timeout_ms),
            )?),
            SourceConfig::Static { documents } => Arc::new(StaticSource::new(documents.clone())),
        };
        built.push(fetcher);
    }

    Ok(match built.len() {
        0 => Arc::new(StaticSource::new(vec![])),
        1 => built.remove(0),
        _ => Arc::new(CompositeSource::new(built)),
    })
}

/// Periodically drop expired cache entries and finished rate-limit windows.
pub fn spawn_maintenance(
    cache: Arc<InMemoryCacheStore<Vec<ResultRecord>>>,
    limiter: Arc<FixedWindowLimiter>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = cache.purge_expired();
                    let counters = limiter.cleanup();
                    debug!(purged, counters, "Maintenance sweep");
                }
                _ = stop.changed() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_cache::{CacheSettings, CacheStore};
    use sift_core::ManualClock;

    #[test]
    fn test_build_source_shapes() {
        assert_eq!(build_source(&[]).unwrap().name(), "static");

        let one = build_source(&[SourceConfig::File {
            path: "docs.jsonl".into(),
        }])
        .unwrap();
        assert_ne!(one.name(), "composite");

        let two = build_source(&[
            SourceConfig::File {
                path: "docs.jsonl".into(),
            },
            SourceConfig::Static { documents: vec![] },
        ])
        .unwrap();
        assert_eq!(two.name(), "composite");
    }

    #[test]
    fn test_remote_embedder_requires_key_variable() {
        let config = EmbeddingConfig::Remote {
            url: "http://127.0.0.1:1/embeddings".into(),
            model: "m".into(),
            api_key_env: Some("SIFT_TEST_KEY_THAT_IS_NOT_SET".into()),
            dimension: 8,
            timeout_ms: 100,
        };
        assert!(matches!(build_embedder(&config), Err(SiftError::Config(_))));
    }

    #[tokio::test]
    async fn test_maintenance_sweeps_and_stops() {
        let clock = ManualClock::new();
        let cache = Arc::new(
            InMemoryCacheStore::new(
                CacheSettings {
                    max_entries: 10,
                    sweep_every: 1000,
                },
                Arc::new(clock.clone()),
            )
            .unwrap(),
        );
        cache
            .put("k", vec![], Duration::from_secs(1))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.len(), 1);

        let limiter = Arc::new(FixedWindowLimiter::new(Arc::new(clock.clone())));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = spawn_maintenance(
            cache.clone(),
            limiter,
            Duration::from_millis(10),
            stop_rx,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
