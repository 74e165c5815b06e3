//! Error types for the ingest pipeline
//!
//! Three tiers, each with its own recovery policy:
//!
//! - [`MalformedRecordError`]: one game is unusable. The record is skipped and
//!   the batch carries on.
//! - [`SinkError`]: the store refused or failed a bulk request. Transient
//!   variants are retried by the sink; anything left over fails that chunk
//!   only.
//! - [`IngestError`]: the run itself cannot continue (the input file cannot
//!   be opened or read, or configuration is invalid).

use std::path::PathBuf;
use thiserror::Error;

/// A single game record could not be turned into a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecordError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a valid integer: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

impl MalformedRecordError {
    /// Name of the offending header field (`moves` for the move list)
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField(field) => field,
            Self::InvalidNumber { field, .. } => field,
        }
    }
}

/// Failure talking to the document store.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Timeouts, connection resets, throttling and gateway errors
    #[error("transient sink failure: {0}")]
    Transient(String),

    #[error("bulk request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("failed to encode bulk payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("sink client error: {0}")]
    Client(String),
}

impl SinkError {
    /// Whether the retry budget applies to this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::Transient(err.to_string())
        } else if err.is_decode() {
            // A truncated response body usually means the node went away mid-reply
            Self::Transient(format!("unreadable bulk response: {err}"))
        } else {
            Self::Client(err.to_string())
        }
    }
}

/// Errors that abort an ingest run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to open input file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read input after {records_read} records: {source}")]
    Read {
        records_read: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
