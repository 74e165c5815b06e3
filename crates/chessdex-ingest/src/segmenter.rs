//! Record segmentation
//!
//! Splits a PGN export into one text block per game. Only the move-list line
//! (the line starting with `1.`) closes a record; headers, blank lines and
//! anything else are carried along into the next record. Input is consumed
//! line by line so files far larger than memory stream through.

use chessdex_common::checksum::sha256_hex;
use futures::stream::{self, Stream};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::error::IngestError;

/// Read buffer for input files
const READ_BUFFER_SIZE: usize = 1 << 20;

/// The text of one game, exactly as it appeared in the input.
///
/// Every line, including the last, ends with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    text: String,
}

impl RawRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// SHA-256 hex digest of the record text; the document `_id`.
    pub fn identity(&self) -> String {
        sha256_hex(&self.text)
    }
}

/// Whether `line` is a move-list line (and therefore ends a record)
pub fn is_move_line(line: &str) -> bool {
    line.starts_with("1.")
}

/// Line-at-a-time record builder.
#[derive(Debug, Default)]
pub struct RecordSegmenter {
    buffer: String,
    pending_lines: usize,
}

impl RecordSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). Returns the finished record
    /// when `line` is a move-list line.
    pub fn push_line(&mut self, line: &str) -> Option<RawRecord> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        self.buffer.push_str(line);
        self.buffer.push('\n');

        if is_move_line(line) {
            self.pending_lines = 0;
            return Some(RawRecord::new(std::mem::take(&mut self.buffer)));
        }

        if !line.trim().is_empty() {
            self.pending_lines += 1;
        }
        None
    }

    /// End of input. Any partial record is discarded; returns how many
    /// non-blank lines it held.
    pub fn finish(self) -> usize {
        self.pending_lines
    }
}

/// Stream the records of `reader`. The stream ends after the first read error.
pub fn records<R>(reader: R) -> impl Stream<Item = io::Result<RawRecord>> + Send
where
    R: AsyncBufRead + Unpin + Send,
{
    let state = Some((reader.lines(), RecordSegmenter::new()));

    stream::unfold(state, |state| async move {
        let (mut lines, mut segmenter) = state?;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(record) = segmenter.push_line(&line) {
                        return Some((Ok(record), Some((lines, segmenter))));
                    }
                },
                Ok(None) => {
                    let dropped = segmenter.finish();
                    if dropped > 0 {
                        debug!(dropped_lines = dropped, "Dropped partial record at end of input");
                    }
                    return None;
                },
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
}

/// Open `path` and stream its records.
pub async fn open_records(
    path: impl AsRef<Path>,
) -> Result<impl Stream<Item = io::Result<RawRecord>> + Send, IngestError> {
    let path = path.as_ref();
    let file = File::open(path).await.map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(records(BufReader::with_capacity(READ_BUFFER_SIZE, file)))
}
