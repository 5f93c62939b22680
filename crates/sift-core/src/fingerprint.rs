use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic cache key derived from every parameter that affects results.
///
/// Fields are length-prefixed before hashing, so two different
/// `(text, top_k)` pairs never feed the hasher the same byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// Fingerprint a query and its result count.
    pub fn new(query_text: &str, top_k: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((query_text.len() as u64).to_le_bytes());
        hasher.update(query_text.as_bytes());
        hasher.update((top_k as u64).to_le_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex-encoded digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
