//! Batch scheduler
//!
//! Reads records sequentially, groups them into fixed-size batches and runs
//! each batch (parse, then bulk submit) on its own tokio task. At most
//! `concurrency` batches are in flight; when the cap is reached, reading
//! pauses until one finishes. Batches are dispatched in file order and may
//! complete in any order. A run returns only after every dispatched batch has
//! finished.

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::parser::parse_batch;
use crate::segmenter::{open_records, RawRecord};
use crate::sink::BulkSink;
use crate::stats::{IngestStats, IngestSummary};

type BatchTasks = FuturesUnordered<JoinHandle<bool>>;

/// Ingestion pipeline: records in, bulk submissions out
pub struct Pipeline {
    config: IngestConfig,
    sink: Arc<dyn BulkSink>,
    stats: Arc<IngestStats>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: IngestConfig, sink: Arc<dyn BulkSink>, stats: Arc<IngestStats>) -> Self {
        Self {
            config,
            sink,
            stats,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop reading when `token` is cancelled. Batches already read are
    /// still submitted.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Ingest every game in the file at `path`.
    pub async fn run_file(&self, path: impl AsRef<Path>) -> Result<IngestSummary, IngestError> {
        let path = path.as_ref();
        info!(
            path = %path.display(),
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            "Starting ingestion"
        );

        let records = open_records(path).await?;
        self.run(records).await
    }

    /// Ingest every record of `records`.
    pub async fn run<S>(&self, records: S) -> Result<IngestSummary, IngestError>
    where
        S: Stream<Item = io::Result<RawRecord>>,
    {
        self.config.validate()?;

        let mut records = std::pin::pin!(records);
        let mut in_flight = BatchTasks::new();
        let mut batch = Vec::with_capacity(self.config.batch_size);
        let mut next_batch_id = 0u64;
        let mut read_error = None;

        loop {
            // A new batch is only started once a worker slot is free, so at
            // most `concurrency` batches of records are held at any time
            if batch.is_empty() {
                self.wait_for_slot(&mut in_flight).await;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(
                        games_read = self.stats.games_read(),
                        "Cancellation requested, no further records will be read"
                    );
                    self.stats.mark_cancelled();
                    break;
                }
                next = records.next() => next,
            };

            match next {
                Some(Ok(record)) => {
                    self.stats.record_read();
                    batch.push(record);
                    if batch.len() >= self.config.batch_size {
                        let full = std::mem::replace(
                            &mut batch,
                            Vec::with_capacity(self.config.batch_size),
                        );
                        in_flight.push(self.dispatch(next_batch_id, full));
                        next_batch_id += 1;
                    }
                },
                Some(Err(e)) => {
                    read_error = Some(e);
                    break;
                },
                None => break,
            }
        }

        if let Some(source) = read_error {
            error!(
                games_read = self.stats.games_read(),
                discarded = batch.len(),
                error = %source,
                "Input read failed, waiting for in-flight batches"
            );
            self.drain(&mut in_flight).await;
            return Err(IngestError::Read {
                records_read: self.stats.games_read(),
                source,
            });
        }

        if !batch.is_empty() {
            in_flight.push(self.dispatch(next_batch_id, batch));
        }

        info!(batches = in_flight.len(), "Waiting for in-flight batches to finish");
        self.drain(&mut in_flight).await;

        let summary = self.stats.snapshot();
        info!(
            games_read = summary.games_read,
            games_parsed = summary.games_parsed,
            games_malformed = summary.games_malformed,
            documents_created = summary.documents_created,
            documents_duplicate = summary.documents_duplicate,
            documents_failed = summary.documents_failed,
            batches_completed = summary.batches_completed,
            batches_failed = summary.batches_failed,
            cancelled = summary.cancelled,
            "Ingestion finished"
        );
        Ok(summary)
    }

    fn dispatch(&self, batch_id: u64, records: Vec<RawRecord>) -> JoinHandle<bool> {
        let in_flight = self.stats.batch_started();
        info!(
            batch = batch_id,
            records = records.len(),
            in_flight,
            "Dispatching batch"
        );

        let task = process_batch(batch_id, records, Arc::clone(&self.sink), Arc::clone(&self.stats));
        tokio::spawn(task.instrument(info_span!("batch", id = batch_id)))
    }

    async fn wait_for_slot(&self, in_flight: &mut BatchTasks) {
        while in_flight.len() >= self.config.concurrency {
            match in_flight.next().await {
                Some(joined) => self.reap(joined),
                None => break,
            }
        }
    }

    async fn drain(&self, in_flight: &mut BatchTasks) {
        while let Some(joined) = in_flight.next().await {
            self.reap(joined);
        }
    }

    fn reap(&self, joined: Result<bool, JoinError>) {
        match joined {
            Ok(ok) => self.stats.batch_finished(ok),
            Err(e) => {
                error!(error = %e, "Batch task panicked");
                self.stats.batch_finished(false);
            },
        }
    }
}

/// Parse one batch on the blocking pool and submit the result. Returns false
/// when any part of the submission failed.
async fn process_batch(
    batch_id: u64,
    records: Vec<RawRecord>,
    sink: Arc<dyn BulkSink>,
    stats: Arc<IngestStats>,
) -> bool {
    let record_count = records.len();

    let parsed = match tokio::task::spawn_blocking(move || parse_batch(&records)).await {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(batch = batch_id, records = record_count, error = %e, "Parsing failed");
            return false;
        },
    };
    stats.record_parsed(parsed.games.len(), parsed.malformed);

    if parsed.games.is_empty() {
        warn!(
            batch = batch_id,
            malformed = parsed.malformed,
            "Batch has no valid games"
        );
        return true;
    }

    match sink.submit(&parsed.games).await {
        Ok(report) => {
            stats.record_report(&report);
            if !report.is_success() {
                error!(
                    batch = batch_id,
                    size = parsed.games.len(),
                    failed = report.failed,
                    failed_chunks = report.failed_chunks,
                    "Batch partially failed"
                );
            }
            info!(
                batch = batch_id,
                parsed = parsed.games.len(),
                malformed = parsed.malformed,
                created = report.created,
                duplicates = report.duplicates,
                submitted = report.total(),
                games_read = stats.games_read(),
                "Batch indexed"
            );
            report.is_success()
        },
        Err(e) => {
            error!(
                batch = batch_id,
                size = parsed.games.len(),
                error = %e,
                "Batch submission failed"
            );
            false
        },
    }
}
