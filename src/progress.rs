//! Bulk-ingest progress reporting.
//!
//! Reports observable progress during `doccat ingest` so users see which
//! file is being handled, how many are left, and an estimate of the time
//! remaining. Progress goes to **stderr** so stdout stays parseable.

use std::io::Write;

use chrono::Utc;

use doccat_core::progress::{IngestProgress, IngestSummary};

/// Receives progress snapshots from the ingest pipeline.
pub trait IngestProgressReporter: Send + Sync {
    /// Called whenever a file reaches an outcome or a new file starts.
    fn report(&self, progress: &IngestProgress);

    /// Called once with the final counts.
    fn finish(&self, _summary: &IngestSummary) {}
}

/// Human-friendly progress: "ingest  12 / 1,250 (1%)  ok 10  failed 1  skipped 1  ~3m left  pump.pdf".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, progress: &IngestProgress) {
        let eta = progress
            .estimated_seconds_remaining(Utc::now())
            .map(|s| format!("  ~{} left", format_duration(s)))
            .unwrap_or_default();
        let line = format!(
            "ingest  {} / {} ({}%)  ok {}  failed {}  skipped {}{}  {}\n",
            format_number(progress.processed() as u64),
            format_number(progress.total as u64),
            progress.percentage(),
            progress.success,
            progress.failed,
            progress.skipped,
            eta,
            progress.current_file.as_deref().unwrap_or("")
        );
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }

    fn finish(&self, summary: &IngestSummary) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "ingest  done: {} ok, {} failed, {} skipped in {:.1}s",
            summary.success,
            summary.failed,
            summary.skipped,
            summary.elapsed_ms as f64 / 1000.0
        );
        for failure in &summary.failures {
            let _ = writeln!(err, "  failed {}: {}", failure.file_name, failure.error);
        }
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, progress: &IngestProgress) {
        let obj = serde_json::json!({
            "event": "progress",
            "total": progress.total,
            "current": progress.current,
            "processed": progress.processed(),
            "success": progress.success,
            "failed": progress.failed,
            "skipped": progress.skipped,
            "percentage": progress.percentage(),
            "eta_seconds": progress.estimated_seconds_remaining(Utc::now()),
            "current_file": progress.current_file,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }

    fn finish(&self, summary: &IngestSummary) {
        let mut obj = serde_json::json!({ "event": "finished" });
        if let (Some(map), Ok(serde_json::Value::Object(fields))) =
            (obj.as_object_mut(), serde_json::to_value(summary))
        {
            map.extend(fields);
        }
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _progress: &IngestProgress) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

fn format_duration(secs: u64) -> String {
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", (secs + 30) / 60),
        _ => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
