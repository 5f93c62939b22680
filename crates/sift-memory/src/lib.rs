//! Vector corpus and semantic search for the Sift search service.
//!
//! Provides embedding generation (local or remote), the searchable corpus
//! with in-memory and file-backed storage, and the search delegate the query
//! path calls on a cache miss.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`] — Trait for text-to-vector backends.
//! - [`LocalEmbedding`] — Hashed bag-of-words embedding, no network needed.
//! - [`RemoteEmbedding`] — Client for an OpenAI-compatible embeddings API.
//! - [`Corpus`] — Trait for the searchable document store.
//! - [`InMemoryCorpus`] / [`FileCorpus`] — Corpus implementations.
//! - [`SearchDelegate`] — Trait the query orchestrator searches through.
//! - [`CorpusSearcher`] — Search delegate over an embedder and a corpus.

/// Corpus trait and storage backends.
pub mod corpus;
/// Embedding provider trait and implementations.
pub mod embedding;
/// Search delegate trait and the corpus-backed implementation.
pub mod search;

pub use corpus::{cosine_similarity, Corpus, FileCorpus, InMemoryCorpus, ScoredDocument, Upsert};
pub use embedding::{EmbeddingProvider, LocalEmbedding, RemoteEmbedding};
pub use search::{CorpusSearcher, SearchDelegate};
