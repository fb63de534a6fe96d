//! # Column Drivers
//!
//! Apply a processing function across an input column and write one result per
//! item into a positional output column. Three strategies are provided:
//!
//! - [`apply_to_column`]: one call per item
//! - [`apply_to_column_batch`]: fixed-size chunks
//! - [`apply_to_column_autobatch`]: chunk size adapts to failures
//!
//! All three share the same contract. The output column is `Vec<Option<R>>`
//! where `None` marks a position that has not been processed. A driver never
//! touches positions before `start_idx`, and the returned
//! [`ApplyReport::success_idx`] is the index a follow-up call should resume
//! from. Processing failures are reported in the [`ApplyOutcome`], not as an
//! `Err`; `Err` is reserved for preconditions checked before any call.

mod adaptive;
mod batch;
mod column;
mod outcome;
mod progress;
mod single;

pub use adaptive::{apply_to_column_autobatch, BatchSizeController, FailureAction};
pub use batch::apply_to_column_batch;
pub use outcome::{ApplyOutcome, ApplyReport};
pub use progress::{ProgressReporter, ProgressUnit};
pub use single::apply_to_column;

pub use crate::config::AdaptiveBatchConfig;

use crate::constants::labels;

/// Per-call driver options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// First input index to process
    pub start_idx: usize,
    /// Label attached to progress and log events
    pub label: &'static str,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            start_idx: 0,
            label: labels::PROCESSING,
        }
    }
}

impl ApplyOptions {
    pub fn starting_at(mut self, start_idx: usize) -> Self {
        self.start_idx = start_idx;
        self
    }

    pub fn labeled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}
