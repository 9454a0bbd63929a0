//! Assertion functions for pipeline outputs.

use crate::row::{RejectionCategory, Row};
use crate::statistic::LoadStatistic;
use crate::value::Value;

/// Assert two row lists are equal in order and content.
///
/// # Panics
///
/// Panics if the lists differ in length or at any index.
pub fn assert_rows_equal(actual: &[Row], expected: &[Row]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "Row mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}");
    }
}

/// Assert the values of `column` across `rows`, in order. A missing column
/// is compared as null.
///
/// # Panics
///
/// Panics on the first differing value.
pub fn assert_column_values(rows: &[Row], column: &str, expected: &[Value]) {
    let actual: Vec<Value> = rows
        .iter()
        .map(|r| r.get(column).cloned().unwrap_or_default())
        .collect();
    assert_eq!(actual, expected, "Column `{column}` mismatch");
}

/// Assert every row has the same keys in the same order.
///
/// # Panics
///
/// Panics on the first row whose key list differs.
pub fn assert_columns(rows: &[Row], expected: &[&str]) {
    for (i, row) in rows.iter().enumerate() {
        let keys: Vec<&str> = row.keys().collect();
        assert_eq!(keys, expected, "Column list mismatch at row {i}");
    }
}

/// Assert how many rows `step` rejected under `category`.
///
/// # Panics
///
/// Panics when the count differs.
pub fn assert_rejections(stats: &LoadStatistic, category: RejectionCategory, step: &str, expected: u64) {
    let actual = stats.rejections_at(category, step);
    assert_eq!(
        actual, expected,
        "Rejections for {category} at `{step}`: expected {expected}, got {actual}\n{stats}"
    );
}

/// Assert the loaded/rejected totals add up to `offered`.
///
/// # Panics
///
/// Panics when rows went unaccounted for.
pub fn assert_accounted(stats: &LoadStatistic, offered: u64) {
    assert_eq!(
        stats.loaded() + stats.rejections(),
        offered,
        "loaded {} + rejected {} != offered {offered}",
        stats.loaded(),
        stats.rejections()
    );
}
