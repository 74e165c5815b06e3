//! Ingestion configuration
//!
//! Batch scheduling, bulk delivery and Elasticsearch connection settings.
//! Everything can be set from the environment (a `.env` file is honoured by
//! the binary) and overridden from the command line.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::IngestError;

// ============================================================================
// Defaults
// ============================================================================

/// Records per batch handed to one worker task.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Maximum batches parsed/submitted at the same time.
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Documents per `_bulk` request.
pub const DEFAULT_CHUNK_SIZE: usize = 5_000;

/// Retries per chunk after the first attempt, so a chunk is sent at most
/// `DEFAULT_MAX_RETRIES + 1` times.
pub const DEFAULT_MAX_RETRIES: u32 = 100;

/// First retry delay; doubles on every further attempt.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 2_000;

/// Upper bound for a single retry delay (10 minutes).
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 600_000;

/// Target index for game summaries.
pub const DEFAULT_INDEX: &str = "chess-summaries";

/// Value of the `db` field stamped on every document.
pub const DEFAULT_SOURCE_DB: &str = "lichess";

/// Elasticsearch endpoint when neither a URL nor a cloud id is configured.
pub const DEFAULT_ES_URL: &str = "http://localhost:9200";

/// Bulk payloads are large; give each request ten minutes.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Input file used when none is given on the command line.
pub const DEFAULT_INPUT_FILE: &str = "lichess_db_standard_rated_2013-01.pgn";

// ============================================================================
// Pipeline configuration
// ============================================================================

/// Batch scheduling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per batch
    pub batch_size: usize,
    /// Maximum in-flight batches
    pub concurrency: usize,
    /// Bulk delivery settings shared by every sink
    pub bulk: BulkOptions,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            bulk: BulkOptions::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// - `CHESSDEX_BATCH_SIZE`
    /// - `CHESSDEX_CONCURRENCY`
    /// - `CHESSDEX_CHUNK_SIZE`
    /// - `CHESSDEX_MAX_RETRIES`
    /// - `CHESSDEX_INITIAL_BACKOFF_MS`
    /// - `CHESSDEX_MAX_BACKOFF_MS`
    pub fn from_env() -> Result<Self, IngestError> {
        let config = Self {
            batch_size: env_parse("CHESSDEX_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            concurrency: env_parse("CHESSDEX_CONCURRENCY", DEFAULT_CONCURRENCY),
            bulk: BulkOptions {
                chunk_size: env_parse("CHESSDEX_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
                max_retries: env_parse("CHESSDEX_MAX_RETRIES", DEFAULT_MAX_RETRIES),
                initial_backoff_ms: env_parse(
                    "CHESSDEX_INITIAL_BACKOFF_MS",
                    DEFAULT_INITIAL_BACKOFF_MS,
                ),
                max_backoff_ms: env_parse("CHESSDEX_MAX_BACKOFF_MS", DEFAULT_MAX_BACKOFF_MS),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.batch_size == 0 {
            return Err(IngestError::Config(
                "CHESSDEX_BATCH_SIZE must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(IngestError::Config(
                "CHESSDEX_CONCURRENCY must be greater than 0".to_string(),
            ));
        }
        self.bulk.validate()
    }
}

/// Chunking and retry settings for bulk submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOptions {
    /// Documents per request
    pub chunk_size: usize,
    /// Retries after the first attempt of a chunk
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl BulkOptions {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::Config(
                "CHESSDEX_CHUNK_SIZE must be greater than 0".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(IngestError::Config(format!(
                "CHESSDEX_INITIAL_BACKOFF_MS ({}) exceeds CHESSDEX_MAX_BACKOFF_MS ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (0-based): exponential, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

// ============================================================================
// Elasticsearch connection
// ============================================================================

/// Elasticsearch connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Cluster URL, e.g. `https://localhost:9200`
    pub url: String,
    /// Elastic Cloud id; takes precedence over `url` when set
    pub cloud_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Encoded API key, sent as `Authorization: ApiKey <key>`
    pub api_key: Option<String>,
    /// Target index
    pub index: String,
    /// Value for the `db` field of every document
    pub source_db: String,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ElasticsearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchConfig")
            .field("url", &self.url)
            .field("cloud_id", &self.cloud_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("index", &self.index)
            .field("source_db", &self.source_db)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ES_URL.to_string(),
            cloud_id: None,
            username: None,
            password: None,
            api_key: None,
            index: DEFAULT_INDEX.to_string(),
            source_db: DEFAULT_SOURCE_DB.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ElasticsearchConfig {
    /// Load connection settings from environment variables
    ///
    /// - `ELASTICSEARCH_URL`
    /// - `ELASTIC_CLOUD_ID`
    /// - `ELASTIC_USERNAME` (defaults to `elastic` when a password is set)
    /// - `ELASTIC_PASSWORD`
    /// - `ELASTIC_API_KEY`
    /// - `ELASTIC_TIMEOUT_SECS`
    /// - `CHESSDEX_INDEX`
    /// - `CHESSDEX_SOURCE_DB`
    pub fn from_env() -> Result<Self, IngestError> {
        let password = env_non_empty("ELASTIC_PASSWORD");
        let username = env_non_empty("ELASTIC_USERNAME")
            .or_else(|| password.as_ref().map(|_| "elastic".to_string()));

        let config = Self {
            url: env_non_empty("ELASTICSEARCH_URL").unwrap_or_else(|| DEFAULT_ES_URL.to_string()),
            cloud_id: env_non_empty("ELASTIC_CLOUD_ID"),
            username,
            password,
            api_key: env_non_empty("ELASTIC_API_KEY"),
            index: env_non_empty("CHESSDEX_INDEX").unwrap_or_else(|| DEFAULT_INDEX.to_string()),
            source_db: env_non_empty("CHESSDEX_SOURCE_DB")
                .unwrap_or_else(|| DEFAULT_SOURCE_DB.to_string()),
            request_timeout_secs: env_parse("ELASTIC_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.index.trim().is_empty() {
            return Err(IngestError::Config("CHESSDEX_INDEX must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(IngestError::Config(
                "ELASTIC_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        self.base_url().map(|_| ())
    }

    /// Request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the cluster URL, decoding the cloud id when one is configured.
    pub fn base_url(&self) -> Result<String, IngestError> {
        match self.cloud_id.as_deref() {
            Some(cloud_id) => decode_cloud_id(cloud_id),
            None => Ok(self.url.trim_end_matches('/').to_string()),
        }
    }
}

/// Decode an Elastic Cloud id (`name:base64(host$es_uuid$kibana_uuid)`) into
/// the Elasticsearch endpoint URL.
fn decode_cloud_id(cloud_id: &str) -> Result<String, IngestError> {
    let invalid = |reason: &str| IngestError::Config(format!("invalid ELASTIC_CLOUD_ID: {reason}"));

    let encoded = cloud_id
        .split_once(':')
        .map(|(_, encoded)| encoded)
        .unwrap_or(cloud_id);
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(&e.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid("not UTF-8"))?;

    let mut parts = decoded.trim_end_matches('\n').split('$');
    let host = parts.next().filter(|h| !h.is_empty()).ok_or_else(|| invalid("missing host"))?;
    let es_uuid = parts
        .next()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| invalid("missing Elasticsearch id"))?;

    // The host may carry an explicit port, e.g. "us-east-1.aws.found.io:9243"
    Ok(format!("https://{es_uuid}.{host}"))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
