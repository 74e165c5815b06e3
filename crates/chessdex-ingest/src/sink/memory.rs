//! In-process sink used for dry runs and tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{BulkReport, BulkSink};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::SinkError;
use crate::models::ParsedGame;

/// Create-only document store keyed by `game_id`
#[derive(Debug)]
pub struct MemorySink {
    documents: Mutex<HashMap<String, ParsedGame>>,
    chunk_size: usize,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl MemorySink {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            chunk_size: chunk_size.max(1),
        }
    }

    fn documents(&self) -> MutexGuard<'_, HashMap<String, ParsedGame>> {
        // A panic elsewhere never leaves the map half-updated
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.documents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents().is_empty()
    }

    pub fn contains(&self, game_id: &str) -> bool {
        self.documents().contains_key(game_id)
    }

    pub fn get(&self, game_id: &str) -> Option<ParsedGame> {
        self.documents().get(game_id).cloned()
    }
}

#[async_trait]
impl BulkSink for MemorySink {
    async fn submit(&self, games: &[ParsedGame]) -> Result<BulkReport, SinkError> {
        let mut report = BulkReport::default();

        for chunk in games.chunks(self.chunk_size) {
            let mut documents = self.documents();
            for game in chunk {
                if documents.contains_key(&game.game_id) {
                    report.duplicates += 1;
                } else {
                    documents.insert(game.game_id.clone(), game.clone());
                    report.created += 1;
                }
            }
        }

        debug!(
            created = report.created,
            duplicates = report.duplicates,
            "Stored documents in memory"
        );
        Ok(report)
    }
}
