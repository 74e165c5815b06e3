//! Shared fixtures for chessdex-ingest integration tests
#![allow(dead_code)]

use chessdex_ingest::{parse_game, ParsedGame, RawRecord};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// A lichess-style game record, unique per `n`, ending with its move line.
pub fn pgn_game(n: usize) -> String {
    format!(
        "[Event \"Rated Blitz game\"]\n\
         [Site \"https://lichess.org/game{n:05}\"]\n\
         [White \"player{n}\"]\n\
         [Black \"opponent{n}\"]\n\
         [Result \"1-0\"]\n\
         [UTCDate \"2013.01.01\"]\n\
         [UTCTime \"00:{:02}:00\"]\n\
         [WhiteElo \"1500\"]\n\
         [BlackElo \"?\"]\n\
         [WhiteRatingDiff \"+10\"]\n\
         [BlackRatingDiff \"-10\"]\n\
         [ECO \"C20\"]\n\
         [Opening \"King's Pawn Game\"]\n\
         [TimeControl \"300+0\"]\n\
         [Termination \"Normal\"]\n\
         \n\
         1. e4 {{ [%eval 0.2] }} 1... e5 2. Qh5?! Nc6 3. Bc4 Nf6?? 4. Qxf7# 1-0\n\
         \n",
        n % 60
    )
}

/// Same layout as [`pgn_game`] with the `WhiteElo` header missing.
pub fn pgn_game_without_elo(n: usize) -> String {
    pgn_game(n)
        .lines()
        .filter(|line| !line.starts_with("[WhiteElo"))
        .map(|line| format!("{line}\n"))
        .collect()
}

/// Write `contents` to a temporary PGN file
pub fn pgn_file(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("games.pgn");
    let mut file = std::fs::File::create(&path).expect("Failed to create PGN file");
    file.write_all(contents.as_bytes()).expect("Failed to write PGN file");
    (dir, path)
}

/// `count` games, concatenated as one export
pub fn pgn_export(count: usize) -> String {
    (0..count).map(pgn_game).collect()
}

/// Parsed documents for `count` distinct games
pub fn parsed_games(count: usize) -> Vec<ParsedGame> {
    (0..count)
        .map(|n| parse_game(&RawRecord::new(pgn_game(n))).expect("fixture game parses"))
        .collect()
}
