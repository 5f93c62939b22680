use serde::Deserialize;
use sift_cache::CacheSettings;
use sift_core::{SiftError, SiftResult, SourceDocument};
use sift_ingest::SchedulerSettings;
use sift_query::QuerySettings;
use sift_security::FailurePolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level contents of `sift.toml`. Every section is optional.
#[derive(Debug, Deserialize, Default)]
pub struct SiftConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_sweep_every")]
    pub sweep_every: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_entries: default_max_entries(),
            sweep_every: default_sweep_every(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// Admit requests when the limiter backend is down. Off by default.
    #[serde(default)]
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_secs: default_window(),
            fail_open: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_ms: u64,
    /// Length of the excerpt reported for documents without a locator.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_top_k: default_max_top_k(),
            request_timeout_ms: default_request_timeout(),
            backend_timeout_ms: default_backend_timeout(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_delay")]
    pub delay_secs: u64,
    #[serde(default = "default_item_timeout")]
    pub item_timeout_ms: u64,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_ingest_delay(),
            item_timeout_ms: default_item_timeout(),
            sources: vec![],
        }
    }
}

/// One `[[ingest.sources]]` entry.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSONL file of documents, re-read every cycle.
    File { path: PathBuf },
    /// Pages fetched over HTTP, one document per URL.
    Http {
        urls: Vec<String>,
        #[serde(default = "default_fetch_timeout")]
        timeout_ms: u64,
    },
    /// Documents written inline in the config file.
    Static { documents: Vec<SourceDocument> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    Local {
        #[serde(default = "default_dimension")]
        dimension: usize,
    },
    Remote {
        url: String,
        model: String,
        /// Name of the environment variable holding the bearer token.
        #[serde(default)]
        api_key_env: Option<String>,
        dimension: usize,
        #[serde(default = "default_embedding_timeout")]
        timeout_ms: u64,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Local {
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CorpusConfig {
    /// JSONL log for a persistent corpus. In-memory when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_maintenance_interval")]
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_maintenance_interval(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_max_entries() -> usize {
    10_000
}
fn default_sweep_every() -> u64 {
    256
}
fn default_limit() -> u32 {
    60
}
fn default_window() -> u64 {
    60
}
fn default_max_top_k() -> usize {
    50
}
fn default_request_timeout() -> u64 {
    5_000
}
fn default_backend_timeout() -> u64 {
    2_000
}
fn default_excerpt_chars() -> usize {
    160
}
fn default_ingest_delay() -> u64 {
    300
}
fn default_item_timeout() -> u64 {
    10_000
}
fn default_fetch_timeout() -> u64 {
    10_000
}
fn default_dimension() -> usize {
    256
}
fn default_embedding_timeout() -> u64 {
    10_000
}
fn default_maintenance_interval() -> u64 {
    60
}

impl SiftConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> SiftResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SiftError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate TOML text.
    pub fn parse(raw: &str) -> SiftResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| SiftError::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> SiftResult<()> {
        let positive = [
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("cache.max_entries", self.cache.max_entries as u64),
            ("cache.sweep_every", self.cache.sweep_every),
            ("rate_limit.window_secs", self.rate_limit.window_secs),
            ("query.max_top_k", self.query.max_top_k as u64),
            ("query.request_timeout_ms", self.query.request_timeout_ms),
            ("query.backend_timeout_ms", self.query.backend_timeout_ms),
            ("ingest.delay_secs", self.ingest.delay_secs),
            ("ingest.item_timeout_ms", self.ingest.item_timeout_ms),
            ("maintenance.interval_secs", self.maintenance.interval_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SiftError::Config(format!("{name} must be greater than 0")));
            }
        }

        let dimension = match &self.embedding {
            EmbeddingConfig::Local { dimension } | EmbeddingConfig::Remote { dimension, .. } => {
                *dimension
            }
        };
        if dimension == 0 {
            return Err(SiftError::Config(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }

        for source in &self.ingest.sources {
            if let SourceConfig::Http { urls, .. } = source {
                if urls.is_empty() {
                    return Err(SiftError::Config(
                        "http source needs at least one url".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_entries: self.cache.max_entries,
            sweep_every: self.cache.sweep_every,
        }
    }

    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            rate_limit: self.rate_limit.limit,
            rate_window: Duration::from_secs(self.rate_limit.window_secs),
            limiter_failure: if self.rate_limit.fail_open {
                FailurePolicy::FailOpen
            } else {
                FailurePolicy::FailClosed
            },
            max_top_k: self.query.max_top_k,
            request_timeout: Duration::from_millis(self.query.request_timeout_ms),
            backend_timeout: Duration::from_millis(self.query.backend_timeout_ms),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            delay: Duration::from_secs(self.ingest.delay_secs),
            item_timeout: Duration::from_millis(self.ingest.item_timeout_ms),
        }
    }
}
