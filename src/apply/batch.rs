//! Fixed-batch driver: consecutive chunks of a constant size.

use super::column;
use super::outcome::{ApplyOutcome, ApplyReport};
use super::progress::{ProgressReporter, ProgressUnit};
use super::ApplyOptions;
use crate::error::{BonsaiError, BonsaiResult};
use crate::logging;

const OPERATION: &str = "apply_to_column_batch";

/// Apply a batch function to `batch_size` chunks of `input`, starting at
/// `options.start_idx`. The last chunk may be shorter.
///
/// A chunk's results are written only once the whole chunk has succeeded, so
/// `success_idx` always lands on a chunk boundary. A failing call, or one that
/// returns a different number of results than it was given, stops the run and
/// leaves every earlier chunk in place.
///
/// # Errors
///
/// Returns `BonsaiError::InvalidInput` before any call when the column
/// preconditions fail or `batch_size` is zero.
pub fn apply_to_column_batch<T, R, E, F>(
    input: &[T],
    output: &mut Vec<Option<R>>,
    mut func: F,
    batch_size: usize,
    options: ApplyOptions,
) -> BonsaiResult<ApplyReport>
where
    F: FnMut(&[T]) -> Result<Vec<R>, E>,
    E: Into<anyhow::Error>,
{
    column::check_preconditions(input, output, options.start_idx)?;
    if batch_size == 0 {
        return Err(BonsaiError::InvalidInput(
            "batch_size must be at least 1.".to_string(),
        ));
    }

    let start_idx = options.start_idx;
    let total = input.len();
    let mut success_idx = start_idx;
    let mut calls = 0;
    let batch_count = (total - start_idx).div_ceil(batch_size);
    let mut progress = ProgressReporter::new(options.label, ProgressUnit::Batch, batch_count);

    logging::log_apply_operation(
        OPERATION,
        options.label,
        start_idx,
        success_idx,
        total,
        "started",
        Some(&format!("batch_size={batch_size}, batches={batch_count}")),
    );

    for batch_start in (start_idx..total).step_by(batch_size) {
        let batch_end = (batch_start + batch_size).min(total);
        let batch = &input[batch_start..batch_end];

        calls += 1;
        let result = func(batch)
            .map_err(Into::into)
            .and_then(|results| column::check_batch_shape(batch.len(), results));

        match result {
            Ok(results) => {
                column::write_all_at(output, batch_start, results);
                success_idx = batch_end;
                progress.advance(1);
            }
            Err(cause) => {
                column::report_stop(
                    OPERATION,
                    options.label,
                    batch_start,
                    start_idx,
                    success_idx,
                    total,
                    &cause,
                );
                return Ok(ApplyReport {
                    start_idx,
                    success_idx,
                    total,
                    calls,
                    failed_calls: 1,
                    outcome: ApplyOutcome::StoppedAt {
                        index: batch_start,
                        cause,
                    },
                });
            }
        }
    }

    progress.finish();
    logging::log_apply_operation(
        OPERATION,
        options.label,
        start_idx,
        success_idx,
        total,
        "completed",
        None,
    );

    Ok(ApplyReport {
        start_idx,
        success_idx,
        total,
        calls,
        failed_calls: 0,
        outcome: ApplyOutcome::Completed,
    })
}
