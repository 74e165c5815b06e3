//! Game parser
//!
//! Turns one [`RawRecord`] into a [`ParsedGame`]. Parsing is pure: the same
//! record always yields the same document (or the same error), which is what
//! makes re-ingesting a file idempotent.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

use crate::error::MalformedRecordError;
use crate::models::{sentinel_timestamp, GameResult, Moves, Opening, ParsedGame, PlayerInfo, Players};
use crate::segmenter::{is_move_line, RawRecord};

/// Header slot holding the move-list line
pub const MOVES_FIELD: &str = "moves";

/// Characters of raw text included in malformed-record warnings
const SNIPPET_LEN: usize = 80;

// Move-text cleanup, applied in declaration order
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{.*?\}").expect("valid comment regex"));
static BLACK_MOVE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\.\.").expect("valid move number regex"));
static ANNOTATION_GLYPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?!|!\?|\?+|!+").expect("valid glyph regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static RESULT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" (1/2-1/2|\d-\d)$").expect("valid result regex"));
static MOVE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\. ").expect("valid move count regex"));

/// Header fields of one record plus the move-list line under [`MOVES_FIELD`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers {
    fields: HashMap<String, String>,
}

impl Headers {
    pub fn parse(text: &str) -> Self {
        let mut fields = HashMap::new();

        for line in text.lines() {
            if let Some(inner) = line.strip_prefix('[') {
                let inner = inner.trim_end();
                let inner = inner.strip_suffix(']').unwrap_or(inner);
                // Lines without the separator carry no field
                if let Some((key, value)) = inner.split_once(" \"") {
                    let value = value.strip_suffix('"').unwrap_or(value);
                    fields.insert(key.trim().to_string(), value.to_string());
                }
            } else if is_move_line(line) {
                fields.insert(MOVES_FIELD.to_string(), line.trim().to_string());
            }
        }

        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn require(&self, key: &'static str) -> Result<&str, MalformedRecordError> {
        self.get(key).ok_or(MalformedRecordError::MissingField(key))
    }
}

/// Parse one record into a document.
pub fn parse_game(record: &RawRecord) -> Result<ParsedGame, MalformedRecordError> {
    let headers = Headers::parse(record.as_str());

    let name = headers.require("Event")?;
    let url = headers.require("Site")?;
    let white = headers.require("White")?;
    let black = headers.require("Black")?;
    let white_elo = parse_elo("WhiteElo", headers.require("WhiteElo")?)?;
    let black_elo = parse_elo("BlackElo", headers.require("BlackElo")?)?;
    let white_diff = parse_rating_diff("WhiteRatingDiff", headers.get("WhiteRatingDiff"))?;
    let black_diff = parse_rating_diff("BlackRatingDiff", headers.get("BlackRatingDiff"))?;
    let termination = headers.require("Termination")?;
    let eco = headers.require("ECO")?;
    let opening = headers.require("Opening")?;
    let timecontrol = headers.require("TimeControl")?;
    let outcome = headers.require("Result")?;
    let moves = headers.require(MOVES_FIELD)?;

    let clean = clean_moves(moves);
    let total_moves = count_moves(&clean);

    Ok(ParsedGame {
        timestamp: game_timestamp(headers.get("UTCDate"), headers.get("UTCTime")),
        name: name.to_string(),
        game_id: record.identity(),
        url: url.to_string(),
        user: Players {
            white: PlayerInfo {
                name: white.to_string(),
                elo: white_elo,
                diff: white_diff,
            },
            black: PlayerInfo {
                name: black.to_string(),
                elo: black_elo,
                diff: black_diff,
            },
        },
        termination: termination.to_lowercase(),
        opening: Opening {
            eco: eco.to_string(),
            name: opening.to_string(),
        },
        timecontrol: timecontrol.to_string(),
        result: GameResult::from_outcome(outcome),
        moves: Moves {
            original: moves.to_string(),
            clean,
            total_moves,
        },
    })
}

/// Documents and skipped-record count for one batch.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub games: Vec<ParsedGame>,
    pub malformed: usize,
}

/// Parse every record of a batch. Malformed records are logged and skipped.
pub fn parse_batch(records: &[RawRecord]) -> ParsedBatch {
    let mut batch = ParsedBatch {
        games: Vec::with_capacity(records.len()),
        malformed: 0,
    };

    for record in records {
        match parse_game(record) {
            Ok(game) => batch.games.push(game),
            Err(e) => {
                batch.malformed += 1;
                warn!(
                    game_id = %record.identity(),
                    field = e.field(),
                    snippet = %snippet(record.as_str()),
                    "Skipping malformed record: {}",
                    e
                );
            },
        }
    }

    batch
}

/// Strip comments, black move numbers, annotation glyphs and the trailing
/// result token; collapse whitespace.
pub fn clean_moves(moves: &str) -> String {
    let clean = COMMENT.replace_all(moves, "");
    let clean = BLACK_MOVE_NUMBER.replace_all(&clean, "");
    let clean = ANNOTATION_GLYPH.replace_all(&clean, "");
    let clean = WHITESPACE.replace_all(&clean, " ");
    let clean = RESULT_TOKEN.replace(clean.trim_end(), "");
    clean.trim().to_string()
}

/// Number of full moves in cleaned move text.
pub fn count_moves(clean: &str) -> u32 {
    u32::try_from(MOVE_NUMBER.find_iter(clean).count()).unwrap_or(u32::MAX)
}

fn parse_elo(field: &'static str, value: &str) -> Result<i32, MalformedRecordError> {
    let value = value.trim();
    if value == "?" {
        return Ok(0);
    }
    value.parse().map_err(|_| MalformedRecordError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_rating_diff(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<i32>, MalformedRecordError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| MalformedRecordError::InvalidNumber {
                field,
                value: value.to_string(),
            }),
    }
}

/// Game start time: exact date and time, else the date at noon, else the
/// far-future sentinel.
fn game_timestamp(date: Option<&str>, time: Option<&str>) -> DateTime<Utc> {
    let Some(date) = date.and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y.%m.%d").ok()) else {
        return sentinel_timestamp();
    };

    let time = time
        .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M:%S").ok())
        .or_else(|| NaiveTime::from_hms_opt(12, 0, 0))
        .unwrap_or_default();

    date.and_time(time).and_utc()
}

fn snippet(text: &str) -> String {
    let flat = text.trim().replace('\n', " ");
    match flat.char_indices().nth(SNIPPET_LEN) {
        Some((end, _)) => format!("{}...", &flat[..end]),
        None => flat,
    }
}
