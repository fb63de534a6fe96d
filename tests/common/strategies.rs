use databonsai_core::AdaptiveBatchConfig;
use proptest::prelude::*;

/// Non-empty columns of short ASCII strings
pub fn column_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 1..40)
}

/// A column together with a valid start index into it
pub fn column_and_start_strategy() -> impl Strategy<Value = (Vec<String>, usize)> {
    column_strategy().prop_flat_map(|column| {
        let len = column.len();
        (Just(column), 0..len)
    })
}

/// Positions at which a processing function should fail
pub fn failure_set_strategy(max_index: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..max_index, 0..4)
}

/// Adaptive settings satisfying every bound
pub fn adaptive_config_strategy() -> impl Strategy<Value = AdaptiveBatchConfig> {
    (1usize..20)
        .prop_flat_map(|max_batch_size| {
            (
                Just(max_batch_size),
                1..=max_batch_size,
                0u32..6,
                1.0f64..3.0,
                0.5f64..1.0,
                0.1f64..1.0,
                1.0f64..2.0,
            )
        })
        .prop_map(
            |(
                max_batch_size,
                batch_size,
                max_retries,
                ramp_factor,
                ramp_factor_decay,
                reduce_factor,
                reduce_factor_decay,
            )| AdaptiveBatchConfig {
                max_retries,
                max_batch_size,
                batch_size,
                ramp_factor,
                ramp_factor_decay,
                reduce_factor,
                reduce_factor_decay,
            },
        )
}
