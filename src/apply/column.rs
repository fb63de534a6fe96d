//! Column bookkeeping shared by the drivers: precondition checks, positional
//! writes into the caller's output column, and stop diagnostics.

use crate::error::{BonsaiError, BonsaiResult};
use crate::logging;

/// Reject calls that cannot make progress before any item is processed
pub(crate) fn check_preconditions<T, R>(
    input: &[T],
    output: &[Option<R>],
    start_idx: usize,
) -> BonsaiResult<()> {
    if input.is_empty() {
        return Err(BonsaiError::InvalidInput(
            "Input column is empty.".to_string(),
        ));
    }

    if start_idx >= input.len() {
        return Err(BonsaiError::InvalidInput(format!(
            "start_idx ({start_idx}) is greater than or equal to the length of the input column ({}).",
            input.len()
        )));
    }

    if output.len() > input.len() {
        return Err(BonsaiError::InvalidInput(format!(
            "The length of the output column ({}) is greater than the length of the input column ({}).",
            output.len(),
            input.len()
        )));
    }

    Ok(())
}

/// Write `value` at `idx`, overwriting in place or extending the column.
/// Positions skipped over by an extension are filled with `None`.
pub(crate) fn write_at<R>(output: &mut Vec<Option<R>>, idx: usize, value: R) {
    if idx < output.len() {
        output[idx] = Some(value);
    } else {
        output.resize_with(idx, || None);
        output.push(Some(value));
    }
}

/// Write consecutive results starting at `start`
pub(crate) fn write_all_at<R>(output: &mut Vec<Option<R>>, start: usize, values: Vec<R>) {
    for (offset, value) in values.into_iter().enumerate() {
        write_at(output, start + offset, value);
    }
}

/// A batch function must return exactly one result per input
pub(crate) fn check_batch_shape<R>(expected: usize, results: Vec<R>) -> anyhow::Result<Vec<R>> {
    if results.len() != expected {
        return Err(BonsaiError::BatchShapeMismatch {
            expected,
            actual: results.len(),
        }
        .into());
    }
    Ok(results)
}

/// Report a recoverable stop: which index failed and the last good index
pub(crate) fn report_stop(
    operation: &str,
    label: &str,
    failed_at: usize,
    start_idx: usize,
    success_idx: usize,
    total: usize,
    cause: &anyhow::Error,
) {
    let last_good = success_idx.checked_sub(1).filter(|idx| *idx >= start_idx);
    tracing::warn!(
        operation = %operation,
        failed_at = failed_at,
        last_good_index = ?last_good,
        error = %cause,
        "Processing stopped; resume from index {success_idx}"
    );
    logging::log_apply_operation(
        operation,
        label,
        start_idx,
        success_idx,
        total,
        "stopped",
        Some(&format!("failed at index {failed_at}: {cause}")),
    );
}
