//! Single-item driver: one call per input item.

use super::column;
use super::outcome::{ApplyOutcome, ApplyReport};
use super::progress::{ProgressReporter, ProgressUnit};
use super::ApplyOptions;
use crate::error::BonsaiResult;
use crate::logging;

const OPERATION: &str = "apply_to_column";

/// Apply `func` to each item of `input` from `options.start_idx` onward.
///
/// Each result is written to `output` as soon as it is produced, extending the
/// column when the position is past its end. The first failing item stops the
/// run: earlier results stay in place and the report's `success_idx` points at
/// the failed item so the caller can resume from it.
///
/// # Errors
///
/// Returns `BonsaiError::InvalidInput` without calling `func` when the input is
/// empty, `start_idx` is out of range, or `output` is longer than `input`.
///
/// # Example
///
/// ```rust
/// use databonsai_core::apply::{apply_to_column, ApplyOptions};
///
/// let input = vec!["a", "b", "c"];
/// let mut output: Vec<Option<String>> = Vec::new();
///
/// let report = apply_to_column(
///     &input,
///     &mut output,
///     |s: &&str| Ok::<_, anyhow::Error>(s.repeat(2)),
///     ApplyOptions::default(),
/// )?;
///
/// assert_eq!(report.success_idx, 3);
/// assert_eq!(output[2].as_deref(), Some("cc"));
/// # Ok::<(), databonsai_core::BonsaiError>(())
/// ```
pub fn apply_to_column<T, R, E, F>(
    input: &[T],
    output: &mut Vec<Option<R>>,
    mut func: F,
    options: ApplyOptions,
) -> BonsaiResult<ApplyReport>
where
    F: FnMut(&T) -> Result<R, E>,
    E: Into<anyhow::Error>,
{
    column::check_preconditions(input, output, options.start_idx)?;

    let start_idx = options.start_idx;
    let total = input.len();
    let mut success_idx = start_idx;
    let mut calls = 0;
    let mut progress = ProgressReporter::new(options.label, ProgressUnit::Row, total - start_idx);

    logging::log_apply_operation(
        OPERATION,
        options.label,
        start_idx,
        success_idx,
        total,
        "started",
        None,
    );

    for (idx, value) in input.iter().enumerate().skip(start_idx) {
        calls += 1;
        match func(value) {
            Ok(result) => {
                column::write_at(output, idx, result);
                success_idx = idx + 1;
                progress.advance(1);
            }
            Err(err) => {
                let cause = err.into();
                column::report_stop(
                    OPERATION,
                    options.label,
                    idx,
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
                    outcome: ApplyOutcome::StoppedAt { index: idx, cause },
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BonsaiError;

    fn shout(s: &String) -> anyhow::Result<String> {
        Ok(s.to_uppercase())
    }

    fn column(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_processes_every_item() {
        let input = column(&["a", "b", "c"]);
        let mut output = Vec::new();

        let report = apply_to_column(&input, &mut output, shout, ApplyOptions::default()).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.success_idx, 3);
        assert_eq!(report.calls, 3);
        assert_eq!(
            output,
            vec![
                Some("A".to_string()),
                Some("B".to_string()),
                Some("C".to_string())
            ]
        );
    }

    #[test]
    fn test_stops_at_first_failure_and_keeps_prefix() {
        let input = column(&["a", "b", "boom", "d"]);
        let mut output = vec![None; 4];

        let report = apply_to_column(
            &input,
            &mut output,
            |s: &String| {
                if s == "boom" {
                    anyhow::bail!("provider unavailable");
                }
                shout(s)
            },
            ApplyOptions::default(),
        )
        .unwrap();

        assert_eq!(report.success_idx, 2);
        assert_eq!(report.failed_calls, 1);
        assert!(matches!(
            report.outcome,
            ApplyOutcome::StoppedAt { index: 2, .. }
        ));
        assert_eq!(
            output,
            vec![Some("A".to_string()), Some("B".to_string()), None, None]
        );
    }

    #[test]
    fn test_failure_on_first_item_returns_start() {
        let input = column(&["a", "b"]);
        let mut output: Vec<Option<String>> = Vec::new();

        let report = apply_to_column(
            &input,
            &mut output,
            |_: &String| Err::<String, _>(BonsaiError::Http("timeout".to_string())),
            ApplyOptions::default().starting_at(1),
        )
        .unwrap();

        assert_eq!(report.success_idx, 1);
        assert_eq!(report.processed(), 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_start_idx_leaves_earlier_positions_untouched() {
        let input = column(&["a", "b", "c"]);
        let mut output = vec![Some("keep".to_string()), None, None];

        let report = apply_to_column(
            &input,
            &mut output,
            shout,
            ApplyOptions::default().starting_at(1),
        )
        .unwrap();

        assert_eq!(report.success_idx, 3);
        assert_eq!(output[0].as_deref(), Some("keep"));
        assert_eq!(output[2].as_deref(), Some("C"));
    }

    #[test]
    fn test_precondition_failures_do_not_call_func() {
        let input = column(&["a"]);
        let mut output = Vec::new();
        let mut called = false;

        let result = apply_to_column(
            &input,
            &mut output,
            |s: &String| {
                called = true;
                shout(s)
            },
            ApplyOptions::default().starting_at(1),
        );

        assert!(matches!(result, Err(BonsaiError::InvalidInput(_))));
        assert!(!called);
    }
}
