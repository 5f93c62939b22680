use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single ranked search hit returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Title of the matched document.
    pub title: String,
    /// Source locator, or a content excerpt when the document has none.
    pub locator: String,
    /// Similarity score; higher is closer.
    pub score: f32,
}

/// A raw document produced by a source fetcher, before embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable identifier; re-ingesting the same id replaces the prior document.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Where the document came from (URL, path). May be empty.
    #[serde(default)]
    pub locator: String,
    /// Raw text that gets embedded.
    pub text: String,
}

/// An embedded document stored in the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    /// Stable identifier, unique within the corpus.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Source locator. May be empty.
    pub locator: String,
    /// Raw text.
    pub text: String,
    /// Embedding of `text`.
    pub embedding: Vec<f32>,
    /// When this version of the document was committed.
    pub ingested_at: DateTime<Utc>,
}

impl CorpusDocument {
    /// Attach an embedding to a fetched source document.
    pub fn from_source(source: SourceDocument, embedding: Vec<f32>) -> Self {
        Self {
            id: source.id,
            title: source.title,
            locator: source.locator,
            text: source.text,
            embedding,
            ingested_at: Utc::now(),
        }
    }

    /// First `max_chars` characters of the text, cut on a char boundary.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut excerpt: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            excerpt.push_str("...");
        }
        excerpt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> SourceDocument {
        SourceDocument {
            id: "doc-1".to_string(),
            title: "Document 1".to_string(),
            locator: String::new(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_from_source_keeps_fields() {
        let doc = CorpusDocument::from_source(source("hello"), vec![1.0, 0.0]);
        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.title, "Document 1");
        assert_eq!(doc.text, "hello");
        assert_eq!(doc.embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let doc = CorpusDocument::from_source(source("héllo wörld"), vec![]);
        assert_eq!(doc.excerpt(5), "héllo...");
        assert_eq!(doc.excerpt(100), "héllo wörld");
    }

    #[test]
    fn test_source_locator_defaults_to_empty() {
        let parsed: SourceDocument =
            serde_json::from_str(r#"{"id":"1","title":"t","text":"body"}"#).unwrap();
        assert!(parsed.locator.is_empty());
    }
}
