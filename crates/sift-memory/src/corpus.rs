use async_trait::async_trait;
use parking_lot::RwLock;
use sift_core::{CorpusDocument, SiftError, SiftResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Whether an upsert created a document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No document with this id existed.
    Inserted,
    /// A prior version was replaced.
    Replaced,
}

/// A corpus document with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    /// The matching document.
    pub document: Arc<CorpusDocument>,
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
}

/// Trait for the searchable corpus.
///
/// The ingestion path is the only writer; the query path only searches.
#[async_trait]
pub trait Corpus: Send + Sync {
    /// Insert a document, replacing any prior version with the same id.
    async fn upsert(&self, document: CorpusDocument) -> SiftResult<Upsert>;

    /// Top-k documents by cosine similarity to `query_embedding`, best first.
    async fn search(&self, query_embedding: &[f32], top_k: usize)
        -> SiftResult<Vec<ScoredDocument>>;

    /// Look up a document by id.
    async fn get(&self, id: &str) -> SiftResult<Option<Arc<CorpusDocument>>>;

    /// Number of documents.
    async fn count(&self) -> SiftResult<usize>;
}

/// In-memory corpus using brute-force cosine similarity.
///
/// The lock is only held for a single map operation or a scoring pass, never
/// across an await, so ingestion commits cannot stall a search for longer
/// than one insert.
pub struct InMemoryCorpus {
    documents: RwLock<HashMap<String, Arc<CorpusDocument>>>,
}

impl InMemoryCorpus {
    /// Create an empty corpus.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn snapshot(&self) -> Vec<Arc<CorpusDocument>> {
        self.documents.read().values().cloned().collect()
    }
}

impl Default for InMemoryCorpus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Corpus for InMemoryCorpus {
    async fn upsert(&self, document: CorpusDocument) -> SiftResult<Upsert> {
        let id = document.id.clone();
        let previous = self.documents.write().insert(id, Arc::new(document));
        Ok(match previous {
            Some(_) => Upsert::Replaced,
            None => Upsert::Inserted,
        })
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> SiftResult<Vec<ScoredDocument>> {
        if query_embedding.is_empty() {
            return Err(SiftError::Corpus("Empty query embedding".to_string()));
        }

        let mut scored: Vec<ScoredDocument> = self
            .documents
            .read()
            .values()
            .map(|doc| ScoredDocument {
                score: cosine_similarity(query_embedding, &doc.embedding),
                document: doc.clone(),
            })
            .collect();

        // Score descending, id ascending for a stable order between ties.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn get(&self, id: &str) -> SiftResult<Option<Arc<CorpusDocument>>> {
        Ok(self.documents.read().get(id).cloned())
    }

    async fn count(&self) -> SiftResult<usize> {
        Ok(self.documents.read().len())
    }
}

/// File-backed corpus that logs every upsert as a JSONL line on disk.
///
/// On load the last line for each id wins, so the log never needs rewriting
/// on the write path. [`FileCorpus::compact`] drops superseded lines.
/// A line that does not parse (a write torn by a crash) is skipped on load.
/// Each commit runs in its own task, so a caller that gives up waiting
/// cannot leave a half-written line behind.
pub struct FileCorpus {
    path: PathBuf,
    inner: Arc<InMemoryCorpus>,
    writer: Arc<Mutex<()>>,
}

impl FileCorpus {
    /// Open the corpus at the given path, replaying the log if it exists.
    pub async fn open(path: PathBuf) -> SiftResult<Self> {
        let inner = InMemoryCorpus::new();

        if path.exists() {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| SiftError::Corpus(format!("Failed to read corpus: {e}")))?;
            let mut skipped = 0usize;
            for (lineno, line) in data.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<CorpusDocument>(line) {
                    Ok(doc) => {
                        inner.upsert(doc).await?;
                    }
                    Err(e) => {
                        skipped += 1;
                        warn!(
                            path = %path.display(),
                            line = lineno + 1,
                            error = %e,
                            "Skipping unreadable corpus entry"
                        );
                    }
                }
            }
            if skipped > 0 {
                warn!(skipped, "Corpus loaded with unreadable entries; compact to drop them");
            }
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SiftError::Corpus(format!("Failed to create dir: {e}")))?;
        }

        Ok(Self {
            path,
            inner: Arc::new(inner),
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// Rewrite the log with exactly one line per live document.
    pub async fn compact(&self) -> SiftResult<()> {
        let _guard = self.writer.lock().await;
        let mut docs = self.inner.snapshot();
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        let mut data = String::new();
        for doc in &docs {
            data.push_str(&serde_json::to_string(doc.as_ref())?);
            data.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(|e| SiftError::Corpus(format!("Failed to write corpus: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SiftError::Corpus(format!("Failed to replace corpus: {e}")))?;
        Ok(())
    }
}

async fn append_line(path: &Path, line: &[u8]) -> SiftResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| SiftError::Corpus(format!("Failed to open corpus: {e}")))?;
    file.write_all(line)
        .await
        .map_err(|e| SiftError::Corpus(format!("Failed to write entry: {e}")))?;
    file.flush()
        .await
        .map_err(|e| SiftError::Corpus(format!("Failed to flush entry: {e}")))?;
    Ok(())
}

#[async_trait]
impl Corpus for FileCorpus {
    async fn upsert(&self, document: CorpusDocument) -> SiftResult<Upsert> {
        let mut line = serde_json::to_vec(&document)?;
        line.push(b'\n');

        let path = self.path.clone();
        let inner = Arc::clone(&self.inner);
        let writer = Arc::clone(&self.writer);
        // Detached from the caller so a dropped upsert cannot tear the line.
        let commit = tokio::spawn(async move {
            let _guard = writer.lock_owned().await;
            append_line(&path, &line).await?;
            inner.upsert(document).await
        });
        commit
            .await
            .map_err(|e| SiftError::Corpus(format!("Commit task failed: {e}")))?
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> SiftResult<Vec<ScoredDocument>> {
        self.inner.search(query_embedding, top_k).await
    }

    async fn get(&self, id: &str) -> SiftResult<Option<Arc<CorpusDocument>>> {
        self.inner.get(id).await
    }

    async fn count(&self) -> SiftResult<usize> {
        self.inner.count().await
    }
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
