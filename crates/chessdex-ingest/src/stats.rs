//! Run-scoped progress counters
//!
//! One [`IngestStats`] is created per run and shared by handle with every
//! batch task. Counters are relaxed atomics; a [`snapshot`](IngestStats::snapshot)
//! is only a consistent view once the run has finished.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::sink::BulkReport;

#[derive(Debug, Default)]
pub struct IngestStats {
    games_read: AtomicU64,
    games_parsed: AtomicU64,
    games_malformed: AtomicU64,
    documents_created: AtomicU64,
    documents_duplicate: AtomicU64,
    documents_failed: AtomicU64,
    chunks_failed: AtomicU64,
    batches_dispatched: AtomicU64,
    batches_completed: AtomicU64,
    batches_failed: AtomicU64,
    batches_in_flight: AtomicU64,
    peak_batches_in_flight: AtomicU64,
    cancelled: AtomicBool,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self) {
        self.games_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn games_read(&self) -> u64 {
        self.games_read.load(Ordering::Relaxed)
    }

    pub fn record_parsed(&self, parsed: usize, malformed: usize) {
        self.games_parsed.fetch_add(parsed as u64, Ordering::Relaxed);
        self.games_malformed.fetch_add(malformed as u64, Ordering::Relaxed);
    }

    pub fn record_report(&self, report: &BulkReport) {
        self.documents_created.fetch_add(report.created, Ordering::Relaxed);
        self.documents_duplicate.fetch_add(report.duplicates, Ordering::Relaxed);
        self.documents_failed.fetch_add(report.failed, Ordering::Relaxed);
        self.chunks_failed.fetch_add(report.failed_chunks, Ordering::Relaxed);
    }

    /// A batch task was spawned. Returns the new in-flight count.
    pub fn batch_started(&self) -> u64 {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        let in_flight = self.batches_in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_batches_in_flight.fetch_max(in_flight, Ordering::Relaxed);
        in_flight
    }

    /// A batch task ended; `ok` is false when its submission failed.
    pub fn batch_finished(&self, ok: bool) {
        self.batches_in_flight.fetch_sub(1, Ordering::Relaxed);
        if ok {
            self.batches_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn batches_in_flight(&self) -> u64 {
        self.batches_in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_batches_in_flight(&self) -> u64 {
        self.peak_batches_in_flight.load(Ordering::Relaxed)
    }

    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestSummary {
        IngestSummary {
            games_read: self.games_read.load(Ordering::Relaxed),
            games_parsed: self.games_parsed.load(Ordering::Relaxed),
            games_malformed: self.games_malformed.load(Ordering::Relaxed),
            documents_created: self.documents_created.load(Ordering::Relaxed),
            documents_duplicate: self.documents_duplicate.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            peak_batches_in_flight: self.peak_batches_in_flight.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub games_read: u64,
    pub games_parsed: u64,
    pub games_malformed: u64,
    pub documents_created: u64,
    pub documents_duplicate: u64,
    pub documents_failed: u64,
    pub chunks_failed: u64,
    pub batches_dispatched: u64,
    pub batches_completed: u64,
    pub batches_failed: u64,
    pub peak_batches_in_flight: u64,
    pub cancelled: bool,
}

impl IngestSummary {
    /// Every batch completed and every document was either created or
    /// already present.
    pub fn is_success(&self) -> bool {
        self.batches_failed == 0 && self.documents_failed == 0 && self.chunks_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_tracking_keeps_peak() {
        let stats = IngestStats::new();
        assert_eq!(stats.batch_started(), 1);
        assert_eq!(stats.batch_started(), 2);
        stats.batch_finished(true);
        assert_eq!(stats.batch_started(), 2);
        stats.batch_finished(true);
        stats.batch_finished(false);

        let summary = stats.snapshot();
        assert_eq!(stats.batches_in_flight(), 0);
        assert_eq!(summary.peak_batches_in_flight, 2);
        assert_eq!(summary.batches_dispatched, 3);
        assert_eq!(summary.batches_completed, 2);
        assert_eq!(summary.batches_failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_report_counters_accumulate() {
        let stats = IngestStats::new();
        stats.record_report(&BulkReport {
            created: 3,
            duplicates: 2,
            failed: 0,
            failed_chunks: 0,
        });
        stats.record_report(&BulkReport {
            created: 1,
            duplicates: 0,
            failed: 0,
            failed_chunks: 0,
        });
        stats.record_parsed(4, 1);

        let summary = stats.snapshot();
        assert_eq!(summary.documents_created, 4);
        assert_eq!(summary.documents_duplicate, 2);
        assert_eq!(summary.games_parsed, 4);
        assert_eq!(summary.games_malformed, 1);
        assert!(summary.is_success());
    }
}
