//! Chessdex Ingest - load lichess PGN exports into Elasticsearch

use anyhow::{bail, Context, Result};
use chessdex_common::logging::{init_logging, LogConfig, LogLevel};
use chessdex_ingest::config::DEFAULT_INPUT_FILE;
use chessdex_ingest::{
    BulkSink, ElasticsearchConfig, ElasticsearchSink, IngestConfig, IngestStats, MemorySink,
    Pipeline,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod progress;

#[derive(Parser, Debug)]
#[command(name = "chessdex-ingest")]
#[command(author, version, about = "Load chess games from a PGN export into Elasticsearch")]
struct Cli {
    /// PGN file to ingest
    #[arg(env = "CHESSDEX_INPUT", default_value = DEFAULT_INPUT_FILE)]
    file: PathBuf,

    /// Games per batch
    #[arg(long, env = "CHESSDEX_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Maximum batches processed at once
    #[arg(long, env = "CHESSDEX_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Documents per bulk request
    #[arg(long, env = "CHESSDEX_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Retries per bulk request after the first attempt
    #[arg(long, env = "CHESSDEX_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Target index
    #[arg(long, env = "CHESSDEX_INDEX")]
    index: Option<String>,

    /// Elasticsearch URL (overrides ELASTIC_CLOUD_ID)
    #[arg(long, env = "ELASTICSEARCH_URL")]
    es_url: Option<String>,

    /// Parse and deduplicate in memory without writing to Elasticsearch
    #[arg(long, env = "CHESSDEX_DRY_RUN")]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("chessdex-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let config = ingest_config(&cli)?;
    let sink = build_sink(&cli, &config)?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let stats = Arc::new(IngestStats::new());
    let reporter_done = CancellationToken::new();
    let reporter = progress::spawn_reporter(
        progress::create_spinner("Starting..."),
        Arc::clone(&stats),
        reporter_done.clone(),
    );

    let pipeline = Pipeline::new(config, sink, stats).with_cancellation(cancel);
    let result = pipeline.run_file(&cli.file).await;

    reporter_done.cancel();
    if let Err(e) = reporter.await {
        warn!(error = %e, "Progress reporter stopped unexpectedly");
    }

    let summary =
        result.with_context(|| format!("Failed to ingest '{}'", cli.file.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.is_success() {
        bail!(
            "{} batches failed, {} documents not indexed",
            summary.batches_failed,
            summary.documents_failed
        );
    }

    info!("Ingestion complete");
    Ok(())
}

/// Environment first, then command-line overrides
fn ingest_config(cli: &Cli) -> Result<IngestConfig> {
    let mut config = IngestConfig::from_env().context("Invalid ingest configuration")?;

    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.bulk.chunk_size = chunk_size;
    }
    if let Some(max_retries) = cli.max_retries {
        config.bulk.max_retries = max_retries;
    }

    config.validate().context("Invalid ingest configuration")?;
    Ok(config)
}

fn build_sink(cli: &Cli, config: &IngestConfig) -> Result<Arc<dyn BulkSink>> {
    if cli.dry_run {
        info!("Dry run: documents are kept in memory only");
        return Ok(Arc::new(MemorySink::new(config.bulk.chunk_size)));
    }

    let mut es = ElasticsearchConfig::from_env().context("Invalid Elasticsearch configuration")?;
    if let Some(index) = &cli.index {
        es.index = index.clone();
    }
    if let Some(url) = &cli.es_url {
        es.url = url.clone();
        es.cloud_id = None;
    }
    es.validate().context("Invalid Elasticsearch configuration")?;

    info!(url = %es.base_url()?, index = %es.index, "Writing to Elasticsearch");
    let sink = ElasticsearchSink::new(&es, config.bulk.clone())
        .context("Failed to create Elasticsearch client")?;
    Ok(Arc::new(sink))
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        warn!("Received Ctrl+C, finishing in-flight batches");
        cancel.cancel();
    });
}
