//! Progress reporting for column runs.
//!
//! Progress is advisory: it is emitted as `tracing` events and never affects
//! control flow.

use std::fmt;
use std::time::{Duration, Instant};

/// Unit counted by a progress reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Row,
    Batch,
}

impl fmt::Display for ProgressUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressUnit::Row => write!(f, "row"),
            ProgressUnit::Batch => write!(f, "batch"),
        }
    }
}

/// Counts processed units against a known total
#[derive(Debug)]
pub struct ProgressReporter {
    label: &'static str,
    unit: ProgressUnit,
    total: usize,
    processed: usize,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(label: &'static str, unit: ProgressUnit, total: usize) -> Self {
        Self {
            label,
            unit,
            total,
            processed: 0,
            start_time: Instant::now(),
        }
    }

    /// Record `count` more processed units
    pub fn advance(&mut self, count: usize) {
        self.processed = (self.processed + count).min(self.total);
        tracing::debug!(
            label = self.label,
            unit = %self.unit,
            processed = self.processed,
            total = self.total,
            "{}: {}/{} {}",
            self.label,
            self.processed,
            self.total,
            self.unit
        );
    }

    /// Emit the closing summary
    pub fn finish(&self) {
        let elapsed = self.elapsed();
        tracing::info!(
            label = self.label,
            unit = %self.unit,
            processed = self.processed,
            total = self.total,
            elapsed_ms = elapsed.as_millis() as u64,
            rate_per_sec = self.rate(elapsed),
            "{} finished",
            self.label
        );
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn rate(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_capped_at_total() {
        let mut progress = ProgressReporter::new("Processing", ProgressUnit::Batch, 3);
        progress.advance(2);
        assert_eq!(progress.processed(), 2);
        progress.advance(5);
        assert_eq!(progress.processed(), 3);
        assert_eq!(progress.total(), 3);
        progress.finish();
    }

    #[test]
    fn test_unit_display() {
        assert_eq!(ProgressUnit::Row.to_string(), "row");
        assert_eq!(ProgressUnit::Batch.to_string(), "batch");
    }
}
