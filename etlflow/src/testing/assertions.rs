//! Test assertions for pipeline outputs.

use crate::core::Record;
use crate::metrics::InMemoryMetrics;

/// Asserts that two record lists hold the same records, in any order.
pub fn assert_records_unordered(actual: &[Record], expected: &[Record]) {
    let mut actual: Vec<String> = actual.iter().map(Record::to_string).collect();
    let mut expected: Vec<String> = expected.iter().map(Record::to_string).collect();
    actual.sort();
    expected.sort();
    assert_eq!(actual, expected, "Records differ (order ignored)");
}

/// Asserts the value of a stage counter.
pub fn assert_counter(metrics: &InMemoryMetrics, stage: &str, name: &str, expected: u64) {
    let actual = metrics.counter(stage, name);
    assert_eq!(
        actual, expected,
        "Expected {name} = {expected} for stage '{stage}', got {actual}"
    );
}
