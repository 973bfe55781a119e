//! Bulk-ingest progress snapshots and summary.
//!
//! Counters are local to one pipeline run. `processed` counts every file
//! that reached a terminal outcome (success, failed, or skipped).

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Percentage of processed files, rounded to the nearest integer.
/// Zero when there is nothing to process.
pub fn progress_percentage(processed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u32
}

/// Seconds left, extrapolated from the mean time per processed file.
/// `None` until at least one file has been processed.
pub fn estimated_time_remaining(elapsed_ms: u64, processed: usize, total: usize) -> Option<u64> {
    if processed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(processed) as f64;
    let per_file_ms = elapsed_ms as f64 / processed as f64;
    Some((per_file_ms * remaining / 1000.0).round() as u64)
}

/// Running counters of one bulk-ingest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestProgress {
    pub total: usize,
    /// Index (1-based) of the file currently being handled.
    pub current: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub current_file: Option<String>,
    pub start_time: DateTime<Utc>,
}

impl IngestProgress {
    pub fn new(total: usize, start_time: DateTime<Utc>) -> Self {
        Self {
            total,
            current: 0,
            success: 0,
            failed: 0,
            skipped: 0,
            current_file: None,
            start_time,
        }
    }

    pub fn processed(&self) -> usize {
        self.success + self.failed + self.skipped
    }

    pub fn percentage(&self) -> u32 {
        progress_percentage(self.processed(), self.total)
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.start_time).num_milliseconds().max(0) as u64
    }

    pub fn estimated_seconds_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        estimated_time_remaining(self.elapsed_ms(now), self.processed(), self.total)
    }
}

/// One file that could not be ingested, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestFailure {
    pub file_name: String,
    pub error: String,
}

/// Terminal result of a bulk-ingest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<IngestFailure>,
    pub elapsed_ms: u64,
}

impl IngestSummary {
    /// Counts are exhaustive and mutually exclusive.
    pub fn is_consistent(&self) -> bool {
        self.success + self.failed + self.skipped == self.total
            && self.failures.len() == self.failed
    }
}
