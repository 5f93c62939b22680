use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use sift_core::{ResultRecord, SiftError, SiftResult};
use std::sync::Arc;
use tracing::debug;

/// Trait for the component that turns a query into ranked results.
///
/// Every failure surfaces as [`SiftError::DelegateUnavailable`] so callers can
/// tell backend faults apart from their own input errors.
#[async_trait]
pub trait SearchDelegate: Send + Sync {
    /// Embed `query_text` and return up to `top_k` ranked matches.
    async fn search(&self, query_text: &str, top_k: usize) -> SiftResult<Vec<ResultRecord>>;
}

/// Search delegate backed by an embedding provider and a [`Corpus`].
pub struct CorpusSearcher {
    embedder: Arc<dyn EmbeddingProvider>,
    corpus: Arc<dyn Corpus>,
    excerpt_chars: usize,
}

impl CorpusSearcher {
    /// Create a searcher. Documents without a locator are reported with an
    /// excerpt of `excerpt_chars` characters instead.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn Corpus>,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            embedder,
            corpus,
            excerpt_chars,
        }
    }
}

#[async_trait]
impl SearchDelegate for CorpusSearcher {
    async fn search(&self, query_text: &str, top_k: usize) -> SiftResult<Vec<ResultRecord>> {
        let embedding = self
            .embedder
            .embed(query_text)
            .await
            .map_err(|e| SiftError::DelegateUnavailable(format!("embedding: {e}")))?;

        let hits = self
            .corpus
            .search(&embedding, top_k)
            .await
            .map_err(|e| SiftError::DelegateUnavailable(format!("corpus: {e}")))?;

        debug!(top_k, hits = hits.len(), "Corpus search complete");

        Ok(hits
            .into_iter()
            .map(|hit| ResultRecord {
                title: hit.document.title.clone(),
                locator: if hit.document.locator.is_empty() {
                    hit.document.excerpt(self.excerpt_chars)
                } else {
                    hit.document.locator.clone()
                },
                score: hit.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::InMemoryCorpus;
    use crate::embedding::LocalEmbedding;
    use sift_core::{CorpusDocument, SourceDocument};

    async fn seeded() -> CorpusSearcher {
        let embedder = Arc::new(LocalEmbedding::new(128));
        let corpus = Arc::new(InMemoryCorpus::new());
        let sources = [
            ("1", "Rust", "https://example.com/rust", "rust ownership borrowing lifetimes"),
            ("2", "Cooking", "", "pasta recipes with tomato sauce and basil"),
        ];
        for (id, title, locator, text) in sources {
            let source = SourceDocument {
                id: id.to_string(),
                title: title.to_string(),
                locator: locator.to_string(),
                text: text.to_string(),
            };
            let embedding = embedder.embed(text).await.unwrap();
            corpus
                .upsert(CorpusDocument::from_source(source, embedding))
                .await
                .unwrap();
        }
        CorpusSearcher::new(embedder, corpus, 10)
    }

    #[tokio::test]
    async fn test_best_match_first() {
        let searcher = seeded().await;
        let results = searcher.search("rust borrowing", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust");
        assert_eq!(results[0].locator, "https://example.com/rust");
    }

    #[tokio::test]
    async fn test_excerpt_when_no_locator() {
        let searcher = seeded().await;
        let results = searcher.search("pasta tomato", 1).await.unwrap();
        assert_eq!(results[0].title, "Cooking");
        assert_eq!(results[0].locator, "pasta reci...");
    }

    #[tokio::test]
    async fn test_embedding_failure_is_delegate_unavailable() {
        let searcher = seeded().await;
        assert!(matches!(
            searcher.search("", 1).await,
            Err(SiftError::DelegateUnavailable(_))
        ));
    }
}
