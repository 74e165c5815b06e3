//! Bulk sink interface
//!
//! A sink receives the parsed documents of one batch and writes them with
//! create-only semantics keyed by `game_id`. Re-submitting a document that
//! already exists is a duplicate, not a failure.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SinkError;
use crate::models::ParsedGame;

pub mod elasticsearch;
pub mod memory;

pub use elasticsearch::ElasticsearchSink;
pub use memory::MemorySink;

/// Destination for parsed games
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Write `games` as one bulk submission
    ///
    /// Implementations chunk internally. A chunk that cannot be delivered is
    /// counted in the report and the remaining chunks are still attempted;
    /// `Err` is reserved for failures that prevent the submission as a whole.
    /// Empty input is a no-op.
    async fn submit(&self, games: &[ParsedGame]) -> Result<BulkReport, SinkError>;
}

/// Outcome of one bulk submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// Documents newly written
    pub created: u64,
    /// Documents whose `_id` already existed
    pub duplicates: u64,
    /// Documents rejected or never delivered
    pub failed: u64,
    /// Chunks abandoned after the retry budget or a permanent error
    pub failed_chunks: u64,
}

impl BulkReport {
    pub fn merge(&mut self, other: BulkReport) {
        self.created += other.created;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
        self.failed_chunks += other.failed_chunks;
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.failed_chunks == 0
    }

    pub fn total(&self) -> u64 {
        self.created + self.duplicates + self.failed
    }
}
