//! Rate-limited status reporting
//!
//! Progress updates from the workers funnel through the coordinator into
//! this reporter, which keeps cumulative totals and emits at most one
//! stderr line per interval:
//!
//! ```text
//! # files-per-second cumulative-count cumulative-size current-path
//! ```
//!
//! The reporter is dropped when the barrier fires, so nothing prints
//! after the walk.

use crate::units::human;
use std::time::{Duration, Instant};

/// Accumulates walk progress and prints a throttled status line.
pub struct StatusReporter {
    interval: Option<Duration>,
    files: u64,
    bytes: u64,
    last_emit: Instant,
    files_at_last_emit: u64,
}

impl StatusReporter {
    /// `interval_secs <= 0` disables output entirely.
    pub fn new(interval_secs: f64) -> Self {
        let interval = if interval_secs > 0.0 {
            Some(Duration::from_secs_f64(interval_secs))
        } else {
            None
        };
        Self {
            interval,
            files: 0,
            bytes: 0,
            last_emit: Instant::now(),
            files_at_last_emit: 0,
        }
    }

    /// Fold in one progress update; emit a line if the interval elapsed.
    pub fn observe(&mut self, path: &str, files: u64, bytes: u64) {
        self.files += files;
        self.bytes += bytes;

        let Some(interval) = self.interval else {
            return;
        };

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_emit);
        if elapsed < interval {
            return;
        }

        let rate = (self.files - self.files_at_last_emit) as f64 / elapsed.as_secs_f64();
        eprintln!("# {:.0} {} {} {}", rate, self.files, human(self.bytes), path);
        self.last_emit = now;
        self.files_at_last_emit = self.files;
    }

    /// Cumulative counted entries so far.
    pub fn files(&self) -> u64 {
        self.files
    }

    /// Cumulative bytes so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}
