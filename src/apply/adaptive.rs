//! Adaptive-batch driver.
//!
//! Large batches amortize per-call overhead but fail more often (payload size,
//! rate limits); small batches are reliable but slow. The driver walks the
//! column with a batch size that ramps up after every success and shrinks after
//! every failure:
//!
//! ```text
//!            success: size = min(round(size * ramp), max)
//!                     ramp = max(ramp * ramp_decay, 1.0)
//!          ┌───────────────────────┐
//!          │                       │
//!     ┌────┴────┐   failure    ┌───┴─────┐  retries left == 0   ┌───────┐
//!     │  step   │─────────────▶│ shrink  │─────────────────────▶│ fatal │
//!     └─────────┘              └─────────┘                      └───────┘
//!          ▲   size = max(round(size * reduce), 1)
//!          │   reduce = min(reduce * reduce_decay, 1.0)
//!          └─────────────┘
//! ```
//!
//! Results are buffered and written to the output column once, after the last
//! batch. Running out of retries abandons the run without writing anything.

use super::column;
use super::outcome::{ApplyOutcome, ApplyReport};
use super::progress::{ProgressReporter, ProgressUnit};
use super::ApplyOptions;
use crate::config::AdaptiveBatchConfig;
use crate::error::BonsaiResult;
use crate::logging;
use tracing::{debug, warn};

const OPERATION: &str = "apply_to_column_autobatch";

/// What the controller decided after a failed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Try again with the (possibly smaller) current batch size
    Retry { batch_size: usize, retry_count: u32 },
    /// `max_retries` consecutive failures already happened
    Exhausted,
}

/// Batch-size state machine
///
/// Invariants: `1 <= batch_size <= max_batch_size`, `ramp_factor >= 1.0`,
/// `reduce_factor <= 1.0`. `retry_count` counts failures since the last
/// success.
#[derive(Debug, Clone)]
pub struct BatchSizeController {
    batch_size: usize,
    max_batch_size: usize,
    ramp_factor: f64,
    ramp_factor_decay: f64,
    reduce_factor: f64,
    reduce_factor_decay: f64,
    retry_count: u32,
    max_retries: u32,
}

impl BatchSizeController {
    /// Build a controller from validated settings
    pub fn new(config: &AdaptiveBatchConfig) -> BonsaiResult<Self> {
        config.validate()?;
        Ok(Self {
            batch_size: config.batch_size,
            max_batch_size: config.max_batch_size,
            ramp_factor: config.ramp_factor,
            ramp_factor_decay: config.ramp_factor_decay,
            reduce_factor: config.reduce_factor,
            reduce_factor_decay: config.reduce_factor_decay,
            retry_count: 0,
            max_retries: config.max_retries,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn ramp_factor(&self) -> f64 {
        self.ramp_factor
    }

    pub fn reduce_factor(&self) -> f64 {
        self.reduce_factor
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Length of the next batch given how many items are left
    pub fn next_batch_len(&self, remaining: usize) -> usize {
        self.batch_size.min(remaining)
    }

    /// Grow the batch size and soften the ramp. Ends any failure streak.
    pub fn record_success(&mut self) {
        self.retry_count = 0;
        let grown = (self.batch_size as f64 * self.ramp_factor).round() as usize;
        self.batch_size = grown.clamp(1, self.max_batch_size);
        self.ramp_factor = (self.ramp_factor * self.ramp_factor_decay).max(1.0);
    }

    /// Shrink the batch size, or report that no retries are left
    pub fn record_failure(&mut self) -> FailureAction {
        if self.retry_count >= self.max_retries {
            return FailureAction::Exhausted;
        }

        self.retry_count += 1;
        let shrunk = (self.batch_size as f64 * self.reduce_factor).round() as usize;
        self.batch_size = shrunk.clamp(1, self.max_batch_size);
        self.reduce_factor = (self.reduce_factor * self.reduce_factor_decay).min(1.0);

        FailureAction::Retry {
            batch_size: self.batch_size,
            retry_count: self.retry_count,
        }
    }
}

/// Retries ran out; carries whatever had been buffered so the caller can
/// report how much work is being dropped
struct RetriesExhausted<R> {
    cause: anyhow::Error,
    attempts: u32,
    buffered: Vec<R>,
}

/// Apply a batch function across `input` with an adaptively sized batch.
///
/// On success every result from `options.start_idx` onward is written to
/// `output` in one pass and `success_idx == input.len()`. When a batch fails
/// more than `config.max_retries` times in a row the run is abandoned: the
/// report carries [`ApplyOutcome::Fatal`], `success_idx == start_idx` and
/// `output` is left exactly as it was. Re-run with a smaller initial batch
/// size or fall back to [`apply_to_column`](super::apply_to_column).
///
/// # Errors
///
/// Returns an error before any call when the column preconditions fail or
/// `config` violates its invariants.
pub fn apply_to_column_autobatch<T, R, E, F>(
    input: &[T],
    output: &mut Vec<Option<R>>,
    mut func: F,
    config: &AdaptiveBatchConfig,
    options: ApplyOptions,
) -> BonsaiResult<ApplyReport>
where
    F: FnMut(&[T]) -> Result<Vec<R>, E>,
    E: Into<anyhow::Error>,
{
    column::check_preconditions(input, output, options.start_idx)?;
    let mut controller = BatchSizeController::new(config)?;

    let start_idx = options.start_idx;
    let total = input.len();
    let mut calls = 0;
    let mut failed_calls = 0;

    logging::log_apply_operation(
        OPERATION,
        options.label,
        start_idx,
        start_idx,
        total,
        "started",
        Some(&format!(
            "batch_size={}, max_batch_size={}, max_retries={}",
            config.batch_size, config.max_batch_size, config.max_retries
        )),
    );

    let run = run_adaptive_loop(
        &input[start_idx..],
        &mut func,
        &mut controller,
        options.label,
        &mut calls,
        &mut failed_calls,
    );

    match run {
        Ok(processed) => {
            let success_idx = start_idx + processed.len();
            column::write_all_at(output, start_idx, processed);
            logging::log_apply_operation(
                OPERATION,
                options.label,
                start_idx,
                success_idx,
                total,
                "completed",
                Some(&format!("final_batch_size={}", controller.batch_size())),
            );
            Ok(ApplyReport {
                start_idx,
                success_idx,
                total,
                calls,
                failed_calls,
                outcome: ApplyOutcome::Completed,
            })
        }
        Err(exhausted) => {
            let discarded = exhausted.buffered.len();
            logging::log_error(
                "apply",
                OPERATION,
                &exhausted.cause.to_string(),
                Some(&format!(
                    "retries exhausted after {} attempts; {discarded} buffered results discarded; resume from index {start_idx}",
                    exhausted.attempts
                )),
            );
            Ok(ApplyReport {
                start_idx,
                success_idx: start_idx,
                total,
                calls,
                failed_calls,
                outcome: ApplyOutcome::Fatal {
                    cause: exhausted.cause,
                    attempts: exhausted.attempts,
                    discarded,
                },
            })
        }
    }
}

fn run_adaptive_loop<T, R, E, F>(
    mut remaining: &[T],
    func: &mut F,
    controller: &mut BatchSizeController,
    label: &'static str,
    calls: &mut usize,
    failed_calls: &mut usize,
) -> Result<Vec<R>, RetriesExhausted<R>>
where
    F: FnMut(&[T]) -> Result<Vec<R>, E>,
    E: Into<anyhow::Error>,
{
    let mut processed: Vec<R> = Vec::with_capacity(remaining.len());
    let mut progress = ProgressReporter::new(label, ProgressUnit::Row, remaining.len());
    let mut streak_attempts: u32 = 0;

    while !remaining.is_empty() {
        let batch_len = controller.next_batch_len(remaining.len());
        let batch = &remaining[..batch_len];

        *calls += 1;
        let result = func(batch)
            .map_err(Into::into)
            .and_then(|results| column::check_batch_shape(batch_len, results));

        match result {
            Ok(results) => {
                processed.extend(results);
                remaining = &remaining[batch_len..];
                streak_attempts = 0;
                progress.advance(batch_len);

                let previous = controller.batch_size();
                controller.record_success();
                debug!(
                    batch_len = batch_len,
                    previous_batch_size = previous,
                    batch_size = controller.batch_size(),
                    ramp_factor = controller.ramp_factor(),
                    "Batch succeeded"
                );
            }
            Err(cause) => {
                *failed_calls += 1;
                streak_attempts += 1;
                match controller.record_failure() {
                    FailureAction::Retry {
                        batch_size,
                        retry_count,
                    } => {
                        warn!(
                            batch_len = batch_len,
                            batch_size = batch_size,
                            retry_count = retry_count,
                            reduce_factor = controller.reduce_factor(),
                            error = %cause,
                            "Batch failed; retrying with smaller batch"
                        );
                    }
                    FailureAction::Exhausted => {
                        return Err(RetriesExhausted {
                            cause,
                            attempts: streak_attempts,
                            buffered: processed,
                        });
                    }
                }
            }
        }
    }

    progress.finish();
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(batch_size: usize, max_batch_size: usize, max_retries: u32) -> AdaptiveBatchConfig {
        AdaptiveBatchConfig {
            max_retries,
            max_batch_size,
            batch_size,
            ramp_factor: 1.5,
            ramp_factor_decay: 1.0,
            reduce_factor: 0.5,
            reduce_factor_decay: 1.0,
        }
    }

    #[test]
    fn test_controller_growth_is_capped() {
        let mut controller = BatchSizeController::new(&config(2, 5, 3)).unwrap();
        let mut sizes = vec![controller.batch_size()];
        for _ in 0..4 {
            controller.record_success();
            sizes.push(controller.batch_size());
        }
        assert_eq!(sizes, vec![2, 3, 5, 5, 5]);
    }

    #[test]
    fn test_ramp_factor_decays_toward_one() {
        let mut cfg = config(2, 100, 3);
        cfg.ramp_factor = 2.0;
        cfg.ramp_factor_decay = 0.5;
        let mut controller = BatchSizeController::new(&cfg).unwrap();

        controller.record_success();
        assert_eq!(controller.batch_size(), 4);
        assert_eq!(controller.ramp_factor(), 1.0);

        controller.record_success();
        assert_eq!(controller.batch_size(), 4);
        assert_eq!(controller.ramp_factor(), 1.0);
    }

    #[test]
    fn test_shrink_never_goes_below_one() {
        let mut controller = BatchSizeController::new(&config(4, 10, 5)).unwrap();

        assert_eq!(
            controller.record_failure(),
            FailureAction::Retry {
                batch_size: 2,
                retry_count: 1
            }
        );
        assert_eq!(
            controller.record_failure(),
            FailureAction::Retry {
                batch_size: 1,
                retry_count: 2
            }
        );
        assert_eq!(
            controller.record_failure(),
            FailureAction::Retry {
                batch_size: 1,
                retry_count: 3
            }
        );
    }

    #[test]
    fn test_reduce_factor_softening_carries_across_success() {
        let mut cfg = config(40, 50, 5);
        cfg.reduce_factor = 0.5;
        cfg.reduce_factor_decay = 1.5;
        let mut controller = BatchSizeController::new(&cfg).unwrap();

        controller.record_failure();
        assert_eq!(controller.batch_size(), 20);
        assert_eq!(controller.reduce_factor(), 0.75);

        controller.record_success();
        assert_eq!(controller.retry_count(), 0);
        assert_eq!(controller.batch_size(), 30);
        assert_eq!(controller.reduce_factor(), 0.75);

        controller.record_failure();
        assert_eq!(controller.batch_size(), 23);
        assert_eq!(controller.reduce_factor(), 1.0);

        controller.record_failure();
        assert_eq!(controller.batch_size(), 23);
    }

    #[test]
    fn test_retries_exhaust_after_max_retries() {
        let mut controller = BatchSizeController::new(&config(8, 8, 2)).unwrap();
        assert!(matches!(
            controller.record_failure(),
            FailureAction::Retry { .. }
        ));
        assert!(matches!(
            controller.record_failure(),
            FailureAction::Retry { .. }
        ));
        assert_eq!(controller.record_failure(), FailureAction::Exhausted);
    }

    #[test]
    fn test_success_resets_retry_count() {
        let mut controller = BatchSizeController::new(&config(8, 8, 1)).unwrap();
        controller.record_failure();
        assert_eq!(controller.retry_count(), 1);
        controller.record_success();
        assert_eq!(controller.retry_count(), 0);
        assert!(matches!(
            controller.record_failure(),
            FailureAction::Retry { .. }
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_processing() {
        let input = vec![1, 2, 3];
        let mut output: Vec<Option<i32>> = Vec::new();
        let mut called = false;

        let result = apply_to_column_autobatch(
            &input,
            &mut output,
            |batch: &[i32]| {
                called = true;
                Ok::<_, anyhow::Error>(batch.to_vec())
            },
            &config(10, 5, 3),
            ApplyOptions::default(),
        );

        assert!(result.is_err());
        assert!(!called);
    }

    #[test]
    fn test_short_batch_results_shrink_and_retry() {
        let input: Vec<i32> = (0..10).collect();
        let mut output = Vec::new();
        let mut seen = Vec::new();

        let report = apply_to_column_autobatch(
            &input,
            &mut output,
            |batch: &[i32]| {
                seen.push(batch.len());
                let keep = if batch.len() > 3 { batch.len() - 1 } else { batch.len() };
                Ok::<_, anyhow::Error>(batch[..keep].iter().map(|v| v + 100).collect())
            },
            &config(8, 8, 3),
            ApplyOptions::default(),
        )
        .unwrap();

        assert_eq!(seen, vec![8, 4, 2, 3, 5, 3, 2]);
        assert_eq!(report.calls, 7);
        assert_eq!(report.failed_calls, 3);
        assert!(report.is_complete());
        assert_eq!(report.success_idx, 10);
        let expected: Vec<Option<i32>> = (0..10).map(|v| Some(v + 100)).collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_recovers_from_oversized_batches() {
        let input: Vec<i32> = (0..10).collect();
        let mut output = Vec::new();
        let mut seen = Vec::new();

        let report = apply_to_column_autobatch(
            &input,
            &mut output,
            |batch: &[i32]| {
                seen.push(batch.len());
                if batch.len() > 3 {
                    anyhow::bail!("payload too large");
                }
                Ok(batch.iter().map(|v| v * 10).collect())
            },
            &config(8, 8, 3),
            ApplyOptions::default(),
        )
        .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.success_idx, 10);
        assert_eq!(report.failed_calls, seen.iter().filter(|len| **len > 3).count());
        assert!(seen.iter().all(|len| (1..=8).contains(len)));
        let expected: Vec<Option<i32>> = (0..10).map(|v| Some(v * 10)).collect();
        assert_eq!(output, expected);
    }
}
