use async_trait::async_trait;
use serde::Deserialize;
use sift_core::{SiftError, SiftResult};
use std::collections::HashMap;
use std::time::Duration;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> SiftResult<Vec<f32>>;

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Words too common to say anything about what a query is looking for.
const STOPWORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it", "of",
    "on", "or", "that", "the", "this", "to", "was", "what", "when", "where", "which", "with",
];

/// Weight of an adjacent-word pair relative to a single term.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Hashed term embedding computed in-process.
///
/// Text is lowercased and split on non-alphanumerics; single characters and
/// stopwords are dropped. Each remaining term and each adjacent pair of terms
/// is hashed to one signed component, weighted by `1 + ln(count)`, and the
/// result is L2-normalized. Queries and documents go through the same path,
/// so a short query lands near the documents that share its terms.
///
/// Text with no indexable terms embeds to the zero vector.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Create a provider producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a64(feature);
        let slot = (hash % self.dimension as u64) as usize;
        // The top bit picks the sign so collisions tend to cancel out.
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign * weight;
    }
}

fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> SiftResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SiftError::EmbeddingFailure(
                "Cannot embed empty text".to_string(),
            ));
        }

        let terms = terms(text);
        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in &terms {
            *counts.entry(term.clone()).or_default() += 1;
        }
        for pair in terms.windows(2) {
            *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1;
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (feature, count) in &counts {
            let weight = 1.0 + (*count as f32).ln();
            let weight = if feature.contains(' ') {
                weight * BIGRAM_WEIGHT
            } else {
                weight
            };
            self.add_feature(&mut vector, feature.as_bytes(), weight);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Sends `{"model": ..., "input": ...}` and reads `data[0].embedding`.
pub struct RemoteEmbedding {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl RemoteEmbedding {
    /// Create a client. `url` is the full endpoint URL.
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
        timeout: Duration,
    ) -> SiftResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SiftError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            model: model.into(),
            api_key,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedding {
    async fn embed(&self, text: &str) -> SiftResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SiftError::EmbeddingFailure(
                "Cannot embed empty text".to_string(),
            ));
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| SiftError::EmbeddingFailure(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SiftError::EmbeddingFailure(format!(
                "Embedding API error {status}"
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| SiftError::EmbeddingFailure(format!("Invalid embedding response: {e}")))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| SiftError::EmbeddingFailure("Empty embedding response".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(SiftError::EmbeddingFailure(format!(
                "Expected {} dimensions, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
