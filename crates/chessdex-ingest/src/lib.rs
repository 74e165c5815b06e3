//! Chessdex Ingest Library
//!
//! Streams lichess PGN exports into Elasticsearch.
//!
//! # Pipeline
//!
//! - [`segmenter`]: splits the input into one raw record per game
//! - [`parser`]: turns a record into a [`ParsedGame`] document
//! - [`scheduler`]: batches records and runs a bounded number of batches
//!   concurrently
//! - [`sink`]: bulk, create-only delivery with retries
//!
//! # Example
//!
//! ```no_run
//! use chessdex_ingest::{IngestConfig, IngestStats, MemorySink, Pipeline};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(
//!         IngestConfig::default(),
//!         Arc::new(MemorySink::default()),
//!         Arc::new(IngestStats::new()),
//!     );
//!     let summary = pipeline.run_file("lichess_db_standard_rated_2013-01.pgn").await?;
//!     println!("indexed {} games", summary.documents_created);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod scheduler;
pub mod segmenter;
pub mod sink;
pub mod stats;

pub use config::{BulkOptions, ElasticsearchConfig, IngestConfig};
pub use error::{IngestError, MalformedRecordError, SinkError};
pub use models::ParsedGame;
pub use parser::{parse_batch, parse_game};
pub use scheduler::Pipeline;
pub use segmenter::{open_records, records, RawRecord, RecordSegmenter};
pub use sink::{BulkReport, BulkSink, ElasticsearchSink, MemorySink};
pub use stats::{IngestStats, IngestSummary};
