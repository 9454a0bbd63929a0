//! Declarative per-column predicates.
//!
//! A [`Condition`] is an ordered list of column tests joined by logical AND.
//! Tests run in the order they were added and stop at the first failure.
//!
//! ```
//! use rowflow::*;
//! use regex::Regex;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cond = Condition::new()
//!     .eq("gender", "female")
//!     .matches("name", Regex::new("^C")?);
//! assert!(cond.test(&row! { "gender" => "female", "name" => "Cheryl" })?);
//! assert_eq!(cond.to_string(), "gender = female, name -> ^C");
//! # Ok(())
//! # }
//! ```
//!
//! Missing columns are treated asymmetrically: `eq` and `any` simply do not
//! match, while `matches` and `when` need the value and fail with
//! [`EtlError::MissingColumn`].

use crate::error::{EtlError, Result};
use crate::row::Row;
use crate::value::Value;
use regex::Regex;
use std::fmt;
use std::fmt::Write as _;

type Test = Box<dyn Fn(&Row) -> Result<bool>>;

/// What a column must satisfy. Built implicitly from values, lists, regexes
/// and closures when a condition is declared with [`Condition::from_columns`].
pub enum Criterion {
    /// Column equals the value.
    Equals(Value),
    /// Column value is one of the listed values.
    AnyOf(Vec<Value>),
    /// Regex search over the column's string form.
    Pattern(Regex),
    /// Arbitrary test over the column's value.
    Test(Box<dyn Fn(&Value) -> bool>),
}

impl Criterion {
    pub fn test(f: impl Fn(&Value) -> bool + 'static) -> Self {
        Criterion::Test(Box::new(f))
    }
}

impl From<Value> for Criterion {
    fn from(v: Value) -> Self {
        Criterion::Equals(v)
    }
}

impl From<&str> for Criterion {
    fn from(v: &str) -> Self {
        Criterion::Equals(v.into())
    }
}

impl From<String> for Criterion {
    fn from(v: String) -> Self {
        Criterion::Equals(v.into())
    }
}

impl From<i64> for Criterion {
    fn from(v: i64) -> Self {
        Criterion::Equals(v.into())
    }
}

impl From<bool> for Criterion {
    fn from(v: bool) -> Self {
        Criterion::Equals(v.into())
    }
}

impl From<Vec<Value>> for Criterion {
    fn from(v: Vec<Value>) -> Self {
        Criterion::AnyOf(v)
    }
}

impl From<Vec<&str>> for Criterion {
    fn from(v: Vec<&str>) -> Self {
        Criterion::AnyOf(v.into_iter().map(Value::from).collect())
    }
}

impl From<Regex> for Criterion {
    fn from(v: Regex) -> Self {
        Criterion::Pattern(v)
    }
}

#[derive(Default)]
pub struct Condition {
    description: String,
    tests: Vec<Test>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(column, criterion)` pairs; each criterion's shape picks
    /// the combinator.
    pub fn from_columns<K, C, I>(columns: I) -> Self
    where
        K: Into<String>,
        C: Into<Criterion>,
        I: IntoIterator<Item = (K, C)>,
    {
        columns
            .into_iter()
            .fold(Self::new(), |cond, (col, criterion)| cond.with(col, criterion))
    }

    /// Add one `(column, criterion)` pair.
    #[must_use]
    pub fn with(self, column: impl Into<String>, criterion: impl Into<Criterion>) -> Self {
        let column = column.into();
        match criterion.into() {
            Criterion::Equals(v) => self.eq(column, v),
            Criterion::AnyOf(vs) => self.any(column, vs),
            Criterion::Pattern(re) => self.matches(column, re),
            Criterion::Test(f) => self.when(column, f),
        }
    }

    fn describe(&mut self, part: fmt::Arguments<'_>) {
        if !self.description.is_empty() {
            self.description.push_str(", ");
        }
        let _ = self.description.write_fmt(part);
    }

    /// Column equals `value`. A missing column never matches.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        self.describe(format_args!("{column} = {value}"));
        self.tests
            .push(Box::new(move |row| Ok(row.get(&column) == Some(&value))));
        self
    }

    /// Column value is one of `values`. A missing column is tested as null.
    #[must_use]
    pub fn any<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let column = column.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let rendered = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.describe(format_args!("{column} in [{rendered}]"));
        self.tests.push(Box::new(move |row| {
            let v = row.get(&column).unwrap_or(&Value::Null);
            Ok(values.contains(v))
        }));
        self
    }

    /// Regex search over the column's string form. The column must exist.
    #[must_use]
    pub fn matches(mut self, column: impl Into<String>, pattern: Regex) -> Self {
        let column = column.into();
        self.describe(format_args!("{column} -> {pattern}"));
        self.tests.push(Box::new(move |row| {
            let v = row
                .get(&column)
                .ok_or_else(|| EtlError::missing_column(&column, format!("matches {pattern}")))?;
            Ok(pattern.is_match(&v.to_string()))
        }));
        self
    }

    /// Arbitrary test over the column's value. The column must exist.
    #[must_use]
    pub fn when(mut self, column: impl Into<String>, test: impl Fn(&Value) -> bool + 'static) -> Self {
        let column = column.into();
        self.describe(format_args!("{column} -> {{}}"));
        self.tests.push(Box::new(move |row| {
            let v = row
                .get(&column)
                .ok_or_else(|| EtlError::missing_column(&column, "when"))?;
            Ok(test(v))
        }));
        self
    }

    /// Evaluate every test left to right, stopping at the first miss.
    pub fn test(&self, row: &Row) -> Result<bool> {
        for t in &self.tests {
            if !t(row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("description", &self.description)
            .field("tests", &self.tests.len())
            .finish()
    }
}

impl<K: Into<String>, C: Into<Criterion>> FromIterator<(K, C)> for Condition {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        Self::from_columns(iter)
    }
}
