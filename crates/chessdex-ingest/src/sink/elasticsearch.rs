//! Elasticsearch `_bulk` sink
//!
//! Documents are written with the `create` op type and `_id = game_id`, so a
//! game that is already indexed comes back as a 409 and is counted as a
//! duplicate. Each chunk is one `_bulk` request. Transient failures (timeouts,
//! connection errors, 429/502/503/504, and item-level 429s) are retried with
//! exponential backoff; only throttled items are resent.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, warn};

use super::{BulkReport, BulkSink};
use crate::config::{BulkOptions, ElasticsearchConfig};
use crate::error::{IngestError, SinkError};
use crate::models::{timestamp, ParsedGame};

/// Maximum characters of an error response kept in [`SinkError::Rejected`]
const MAX_ERROR_BODY: usize = 500;

const NDJSON: &str = "application/x-ndjson";

/// Writes documents to an Elasticsearch index through the bulk API
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: Client,
    bulk_url: String,
    index: String,
    source_db: String,
    username: Option<String>,
    password: Option<String>,
    options: BulkOptions,
}

impl ElasticsearchSink {
    /// Build the HTTP client once; clones share its connection pool.
    pub fn new(config: &ElasticsearchConfig, options: BulkOptions) -> Result<Self, IngestError> {
        options.validate()?;

        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("ApiKey {api_key}"))
                .map_err(|_| IngestError::Config("ELASTIC_API_KEY is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            bulk_url: format!("{}/_bulk", config.base_url()?),
            index: config.index.clone(),
            source_db: config.source_db.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            options,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Deliver one chunk, retrying transient failures within the budget.
    async fn send_chunk(&self, chunk_id: usize, chunk: &[ParsedGame]) -> BulkReport {
        let mut report = BulkReport::default();
        let mut pending: Vec<&ParsedGame> = chunk.iter().collect();
        let mut retry = 0u32;

        loop {
            let err = match self.send_once(&pending).await {
                Ok(outcome) => {
                    report.created += outcome.created;
                    report.duplicates += outcome.duplicates;
                    report.failed += outcome.failed;
                    if outcome.throttled.is_empty() {
                        return report;
                    }
                    pending = outcome.throttled;
                    SinkError::Transient(format!("{} documents throttled (HTTP 429)", pending.len()))
                },
                Err(e) => e,
            };

            if !err.is_transient() || retry >= self.options.max_retries {
                let err = if err.is_transient() {
                    SinkError::RetriesExhausted {
                        attempts: retry + 1,
                        last_error: err.to_string(),
                    }
                } else {
                    err
                };
                error!(
                    chunk = chunk_id,
                    documents = pending.len(),
                    error = %err,
                    "Bulk chunk failed"
                );
                report.failed += pending.len() as u64;
                report.failed_chunks += 1;
                return report;
            }

            let delay = self.options.backoff(retry);
            retry += 1;
            warn!(
                chunk = chunk_id,
                attempt = retry,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "Bulk request failed, retrying..."
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One `_bulk` round trip.
    async fn send_once<'a>(&self, games: &[&'a ParsedGame]) -> Result<ChunkOutcome<'a>, SinkError> {
        let body = self.encode(games)?;

        let mut request = self
            .client
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, NDJSON)
            .body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();

        if is_transient_status(status) {
            return Err(SinkError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: BulkResponse = response.json().await?;
        if parsed.items.len() != games.len() {
            return Err(SinkError::Client(format!(
                "bulk response has {} items for {} documents",
                parsed.items.len(),
                games.len()
            )));
        }

        let mut outcome = ChunkOutcome::default();
        for (game, item) in games.iter().zip(parsed.items) {
            let Some(result) = item.into_values().next() else {
                outcome.failed += 1;
                continue;
            };
            match result.status {
                200 | 201 => outcome.created += 1,
                409 => outcome.duplicates += 1,
                429 => outcome.throttled.push(*game),
                status => {
                    outcome.failed += 1;
                    warn!(
                        game_id = %game.game_id,
                        status,
                        error = %result.error.unwrap_or_default(),
                        "Document rejected"
                    );
                },
            }
        }

        debug!(
            created = outcome.created,
            duplicates = outcome.duplicates,
            throttled = outcome.throttled.len(),
            took_ms = parsed.took,
            "Bulk request completed"
        );
        Ok(outcome)
    }

    /// NDJSON body: a `create` action line followed by the document, per game.
    fn encode(&self, games: &[&ParsedGame]) -> Result<Vec<u8>, SinkError> {
        let ingested = timestamp::format(&Utc::now());
        let mut body = Vec::with_capacity(games.len() * 1024);

        for &game in games {
            let action = BulkAction {
                create: ActionMeta {
                    index: &self.index,
                    id: &game.game_id,
                },
            };
            serde_json::to_writer(&mut body, &action)?;
            body.push(b'\n');

            let document = StoreDocument {
                game,
                db: &self.source_db,
                event: IngestEvent { ingested: &ingested },
                data_stream: DataStream::CHESS_GAMES,
            };
            serde_json::to_writer(&mut body, &document)?;
            body.push(b'\n');
        }

        Ok(body)
    }
}

#[async_trait]
impl BulkSink for ElasticsearchSink {
    async fn submit(&self, games: &[ParsedGame]) -> Result<BulkReport, SinkError> {
        let mut report = BulkReport::default();

        for (chunk_id, chunk) in games.chunks(self.options.chunk_size).enumerate() {
            report.merge(self.send_chunk(chunk_id, chunk).await);
        }

        Ok(report)
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[derive(Debug, Default)]
struct ChunkOutcome<'a> {
    created: u64,
    duplicates: u64,
    failed: u64,
    throttled: Vec<&'a ParsedGame>,
}

#[derive(Serialize)]
struct BulkAction<'a> {
    create: ActionMeta<'a>,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

/// Game plus the fields stamped at submission time
#[derive(Serialize)]
struct StoreDocument<'a> {
    #[serde(flatten)]
    game: &'a ParsedGame,
    db: &'a str,
    event: IngestEvent<'a>,
    data_stream: DataStream,
}

#[derive(Serialize)]
struct IngestEvent<'a> {
    ingested: &'a str,
}

#[derive(Serialize)]
struct DataStream {
    namespace: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    dataset: &'static str,
}

impl DataStream {
    const CHESS_GAMES: Self = Self {
        namespace: "default",
        kind: "summary",
        dataset: "chess-games",
    };
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemResult>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}
