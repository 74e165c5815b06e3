//! Document model produced by the parser and written by the sinks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp used when a game carries no usable `UTCDate`.
///
/// Placed in the future so such games are easy to spot in time-based views.
pub fn sentinel_timestamp() -> DateTime<Utc> {
    // 2030-01-01T12:00:00Z
    DateTime::from_timestamp(1_893_499_200, 0).unwrap_or_default()
}

/// One parsed game, keyed by the SHA-256 of its raw record text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedGame {
    #[serde(rename = "@timestamp", with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// `Event` header
    pub name: String,
    pub game_id: String,
    /// `Site` header
    pub url: String,
    pub user: Players,
    /// `Termination` header, lower-cased
    pub termination: String,
    pub opening: Opening,
    pub timecontrol: String,
    pub result: GameResult,
    pub moves: Moves,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    pub white: PlayerInfo,
    pub black: PlayerInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    /// 0 when the source reports `?`
    pub elo: i32,
    /// Rating change from this game; absent is not the same as zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub eco: String,
    pub name: String,
}

/// Raw result string plus a flag for the winning side (or draw).
///
/// At most one flag is present; the others are omitted rather than `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw: Option<bool>,
}

impl GameResult {
    pub fn from_outcome(outcome: &str) -> Self {
        let flag = |expected: &str| (outcome == expected).then_some(true);
        Self {
            outcome: outcome.to_string(),
            white: flag("1-0"),
            black: flag("0-1"),
            draw: flag("1/2-1/2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moves {
    /// Move-list line as it appeared in the file (trimmed)
    pub original: String,
    /// Comments, glyphs, black move numbers and the result token removed
    pub clean: String,
    pub total_moves: u32,
}

/// Serialize timestamps as `2013-01-01T12:00:00.000+00:00`.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f+00:00";

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
