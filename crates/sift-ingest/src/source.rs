use async_trait::async_trait;
use sift_core::{SiftError, SiftResult, SourceDocument};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A candidate that could not be fetched or parsed.
#[derive(Debug)]
pub struct FetchFailure {
    /// Which candidate failed (URL, `path:line`, source name).
    pub source: String,
    /// Why it failed.
    pub error: SiftError,
}

/// One fetched candidate, or why it could not be fetched.
pub type Candidate = Result<SourceDocument, FetchFailure>;

/// Trait for producers of raw documents.
///
/// `Err` from [`SourceFetcher::fetch_candidates`] means the whole fetch failed
/// and the cycle is abandoned; individual failures go in the returned list.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Fetch every candidate for this cycle.
    async fn fetch_candidates(&self) -> SiftResult<Vec<Candidate>>;
}

/// Fixed list of documents, returned unchanged every cycle.
pub struct StaticSource {
    documents: Vec<SourceDocument>,
}

impl StaticSource {
    /// Serve `documents` on every fetch.
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl SourceFetcher for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_candidates(&self) -> SiftResult<Vec<Candidate>> {
        Ok(self.documents.iter().cloned().map(Ok).collect())
    }
}

/// JSONL file of [`SourceDocument`]s, re-read every cycle.
///
/// A missing or unreadable file fails the whole fetch; a malformed line only
/// fails that line.
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    /// Read documents from the JSONL file at `path`.
    pub fn new(path: PathBuf) -> Self {
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

#[async_trait]
impl SourceFetcher for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_candidates(&self) -> SiftResult<Vec<Candidate>> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SiftError::Fetch(format!("Failed to read {}: {e}", self.path.display()))
        })?;

        Ok(data
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str::<SourceDocument>(line).map_err(|e| FetchFailure {
                    source: format!("{}:{}", self.path.display(), idx + 1),
                    error: e.into(),
                })
            })
            .collect())
    }
}

/// Fetches each configured URL as one candidate.
///
/// JSON bodies are parsed as a [`SourceDocument`]; any other body becomes the
/// document text, titled by its first non-empty line. If no URL could be
/// reached at all, the whole fetch fails.
pub struct HttpSource {
    http: reqwest::Client,
    urls: Vec<String>,
}

const MAX_TITLE_CHARS: usize = 120;

impl HttpSource {
    /// Fetch `urls`, each request bounded by `timeout`.
    pub fn new(urls: Vec<String>, timeout: Duration) -> SiftResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SiftError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, urls })
    }

    async fn fetch_one(&self, url: &str) -> Result<SourceDocument, (bool, SiftError)> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| (true, SiftError::Fetch(e.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err((false, SiftError::Fetch(format!("HTTP {status}"))));
        }

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let body = resp
            .text()
            .await
            .map_err(|e| (true, SiftError::Fetch(e.to_string())))?;

        if is_json {
            let mut doc: SourceDocument =
                serde_json::from_str(&body).map_err(|e| (false, SiftError::from(e)))?;
            if doc.locator.is_empty() {
                doc.locator = url.to_string();
            }
            return Ok(doc);
        }

        let title = body
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| l.chars().take(MAX_TITLE_CHARS).collect())
            .unwrap_or_else(|| url.to_string());

        Ok(SourceDocument {
            id: url.to_string(),
            title,
            locator: url.to_string(),
            text: body,
        })
    }
}

#[async_trait]
impl SourceFetcher for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_candidates(&self) -> SiftResult<Vec<Candidate>> {
        let mut candidates = Vec::with_capacity(self.urls.len());
        let mut unreachable = 0;

        for url in &self.urls {
            match self.fetch_one(url).await {
                Ok(doc) => candidates.push(Ok(doc)),
                Err((transport, error)) => {
                    if transport {
                        unreachable += 1;
                    }
                    candidates.push(Err(FetchFailure {
                        source: url.clone(),
                        error,
                    }));
                }
            }
        }

        if !self.urls.is_empty() && unreachable == self.urls.len() {
            return Err(SiftError::Fetch(format!(
                "none of {} URLs reachable",
                self.urls.len()
            )));
        }
        Ok(candidates)
    }
}

/// Several sources fetched in order as one.
///
/// A source whose whole fetch fails contributes a single failure item; only
/// when every source fails does the composite fail.
pub struct CompositeSource {
    sources: Vec<Arc<dyn SourceFetcher>>,
}

impl CompositeSource {
    /// Fetch `sources` in the given order.
    pub fn new(sources: Vec<Arc<dyn SourceFetcher>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl SourceFetcher for CompositeSource {
    fn name(&self) -> &str {
        "composite"
    }

    async fn fetch_candidates(&self) -> SiftResult<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut failed = 0;

        for source in &self.sources {
            match source.fetch_candidates().await {
                Ok(items) => candidates.extend(items),
                Err(error) => {
                    failed += 1;
                    warn!(source = source.name(), error = %error, "Source fetch failed");
                    candidates.push(Err(FetchFailure {
                        source: source.name().to_string(),
                        error,
                    }));
                }
            }
        }

        if !self.sources.is_empty() && failed == self.sources.len() {
            return Err(SiftError::Fetch(format!(
                "all {} sources failed",
                self.sources.len()
            )));
        }
        Ok(candidates)
    }
}
