//! Row-selection steps: conditions, uniqueness and limits.
//!
//! Every rejection raised here is an `IGNORE_ROW`: the row was fine, it just
//! is not wanted downstream.

use crate::condition::{Condition, Criterion};
use crate::pipeline::Pipeline;
use crate::row::{RejectionCategory, Row};
use crate::step::{Emit, Step};
use crate::value::Value;
use std::collections::HashSet;

impl Pipeline {
    /// Keep rows matching `condition`; reject the rest as `IGNORE_ROW`.
    ///
    /// A condition combinator that needs a missing column fails the run.
    pub fn filter(self, condition: Condition) -> Self {
        let name = format!("filter {condition}");
        self.add_step(name, move |row: Row| {
            if condition.test(&row)? {
                Ok(row)
            } else {
                let reason = format!("Row did not match the filter {condition}");
                Ok(row.reject(reason, RejectionCategory::IgnoreRow))
            }
        })
    }

    /// [`filter`](Self::filter) over a declarative `(column, criterion)` list.
    ///
    /// ```
    /// use rowflow::*;
    ///
    /// # fn main() -> rowflow::Result<()> {
    /// let stats = from_rows(vec![
    ///     row! { "gender" => "female", "age" => 30 },
    ///     row! { "gender" => "male", "age" => 30 },
    /// ])
    /// .filter_by([("gender", Criterion::from("female"))])
    /// .go()?;
    /// assert_eq!(stats.loaded(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn filter_by<K, C, I>(self, columns: I) -> Self
    where
        K: Into<String>,
        C: Into<Criterion>,
        I: IntoIterator<Item = (K, C)>,
    {
        self.filter(Condition::from_columns(columns))
    }

    /// Keep rows for which `predicate` returns `true`.
    pub fn filter_fn<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&Row) -> bool + 'static,
    {
        self.add_step("filter()", move |row: Row| {
            if predicate(&row) {
                Ok(row)
            } else {
                Ok(row.reject(
                    "Row did not match the filter closure.",
                    RejectionCategory::IgnoreRow,
                ))
            }
        })
    }

    /// Reject every row whose `column` value was already seen during this run.
    /// A missing column counts as null.
    pub fn unique(self, column: impl Into<String>) -> Self {
        let column = column.into();
        let mut seen = SeenValues::default();
        self.add_step(format!("unique({column})"), move |row: Row| {
            let value = row.get(&column).cloned().unwrap_or_default();
            if seen.insert(value) {
                Ok(row)
            } else {
                Ok(row.reject("Non-unique row returned", RejectionCategory::IgnoreRow))
            }
        })
    }

    /// Stop the whole run once more than `limit` rows reach this step.
    pub fn limit(self, limit: usize) -> Self {
        self.limit_with(limit, true)
    }

    /// With `halt`, the first row past `limit` halts the run; without it,
    /// every row past `limit` is rejected as `IGNORE_ROW`.
    pub fn limit_with(self, limit: usize, halt: bool) -> Self {
        let mut seen = 0usize;
        self.push_step(Step::flow(format!("Limit({limit})"), move |row: Row| {
            seen += 1;
            if seen <= limit {
                return Ok(Emit::Row(row));
            }
            let reason = format!("Over the maximum limit of {limit}");
            if halt {
                Ok(Emit::Halt(reason))
            } else {
                Ok(Emit::Row(row.reject(reason, RejectionCategory::IgnoreRow)))
            }
        }));
        self
    }
}

/// Values observed by a `unique` step over one run.
#[derive(Debug, Default)]
struct SeenValues(HashSet<Value>);

impl SeenValues {
    /// `true` the first time `value` is offered.
    fn insert(&mut self, value: Value) -> bool {
        self.0.insert(value)
    }
}
