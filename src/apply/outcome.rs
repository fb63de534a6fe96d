//! Results returned by the column drivers.

use std::fmt;

/// How a driver run ended
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Every item from `start_idx` onward was processed and written
    Completed,

    /// A call failed; output up to `success_idx` is valid and the run can be
    /// resumed from there
    StoppedAt {
        /// First input index of the failing item or batch
        index: usize,
        cause: anyhow::Error,
    },

    /// The adaptive driver ran out of retries. Nothing from this run was
    /// written; `discarded` results had been computed and were dropped.
    Fatal {
        cause: anyhow::Error,
        attempts: u32,
        discarded: usize,
    },
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Completed => write!(f, "completed"),
            ApplyOutcome::StoppedAt { index, cause } => {
                write!(f, "stopped at index {index}: {cause}")
            }
            ApplyOutcome::Fatal {
                cause,
                attempts,
                discarded,
            } => write!(
                f,
                "fatal after {attempts} failed attempts ({discarded} buffered results discarded): {cause}"
            ),
        }
    }
}

/// Summary of one driver call
///
/// `success_idx` is the resumption cursor: `output[start_idx..success_idx]`
/// holds valid results and a follow-up call should pass it as `start_idx`.
#[derive(Debug)]
pub struct ApplyReport {
    pub start_idx: usize,
    pub success_idx: usize,
    /// Length of the input column
    pub total: usize,
    /// Invocations of the processing function
    pub calls: usize,
    /// Invocations that returned an error or a wrong-length batch
    pub failed_calls: usize,
    pub outcome: ApplyOutcome,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, ApplyOutcome::Completed)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.outcome, ApplyOutcome::Fatal { .. })
    }

    /// Items confirmed by this call
    pub fn processed(&self) -> usize {
        self.success_idx - self.start_idx
    }

    /// Items still waiting after this call
    pub fn remaining(&self) -> usize {
        self.total - self.success_idx
    }

    /// The error that ended the run early, if any
    pub fn error(&self) -> Option<&anyhow::Error> {
        match &self.outcome {
            ApplyOutcome::Completed => None,
            ApplyOutcome::StoppedAt { cause, .. } | ApplyOutcome::Fatal { cause, .. } => {
                Some(cause)
            }
        }
    }
}
