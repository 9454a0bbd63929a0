//! Column-level edits: trimming, renaming, setting, computing, removing,
//! clipping and default filling.

use crate::pipeline::Pipeline;
use crate::row::{Rejection, Row};
use crate::step::render_name;
use crate::value::Value;

/// Result of an [`add_field`](Pipeline::add_field) computation: either the
/// value to store, or a rejection for the whole row.
#[derive(Clone, Debug, PartialEq)]
pub enum Computed {
    Value(Value),
    Reject(Rejection),
}

impl From<Value> for Computed {
    fn from(v: Value) -> Self {
        Computed::Value(v)
    }
}

impl From<Rejection> for Computed {
    fn from(r: Rejection) -> Self {
        Computed::Reject(r)
    }
}

impl From<&str> for Computed {
    fn from(v: &str) -> Self {
        Computed::Value(v.into())
    }
}

impl From<String> for Computed {
    fn from(v: String) -> Self {
        Computed::Value(v.into())
    }
}

impl From<i64> for Computed {
    fn from(v: i64) -> Self {
        Computed::Value(v.into())
    }
}

impl From<f64> for Computed {
    fn from(v: f64) -> Self {
        Computed::Value(v.into())
    }
}

impl From<bool> for Computed {
    fn from(v: bool) -> Self {
        Computed::Value(v.into())
    }
}

fn pairs<K: Into<String>, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<(String, V)> {
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

impl Pipeline {
    /// Replace every non-null field with its trimmed string form.
    pub fn trim(self) -> Self {
        self.add_step("trim()", |mut row: Row| {
            for value in row.values_mut() {
                if !value.is_null() {
                    *value = Value::Text(value.to_string().trim().to_string());
                }
            }
            Ok(row)
        })
    }

    /// Rename `from -> to` for each pair, in order. The renamed field keeps
    /// its position; an absent source column is left alone.
    pub fn rename_fields<K, V, I>(self, renames: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let renames: Vec<(String, String)> = renames
            .into_iter()
            .map(|(from, to)| (from.into(), to.into()))
            .collect();
        let description = renames
            .iter()
            .map(|(from, to)| format!("{from} -> {to}"))
            .collect::<Vec<_>>()
            .join(",");
        self.add_step(format!("rename({description})"), move |mut row: Row| {
            for (from, to) in &renames {
                row.rename(from, to);
            }
            Ok(row)
        })
    }

    /// Set `column` to a constant.
    pub fn set_field(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        self.add_step(format!("setField({column})"), move |mut row: Row| {
            row.insert(column.as_str(), value.clone());
            Ok(row)
        })
    }

    /// Set `column` to a value computed from the row. Returning a
    /// [`Rejection`] rejects the row instead.
    ///
    /// ```
    /// use rowflow::*;
    ///
    /// # fn main() -> rowflow::Result<()> {
    /// let stats = from_rows(vec![row! { "a" => 2 }, row! { "a" => 0 }])
    ///     .add_field("half", |row: &Row| {
    ///         Ok(match row.get("a").and_then(Value::as_i64) {
    ///             Some(0) | None => Rejection::new("nothing to halve", RejectionCategory::Rejection).into(),
    ///             Some(a) => Computed::from(a / 2),
    ///         })
    ///     })
    ///     .go()?;
    /// assert_eq!(stats.loaded(), 1);
    /// assert_eq!(stats.rejections_at(RejectionCategory::Rejection, "addField(half)"), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_field<F, C>(self, column: impl Into<String>, mut compute: F) -> Self
    where
        F: FnMut(&Row) -> anyhow::Result<C> + 'static,
        C: Into<Computed>,
    {
        let column = column.into();
        self.add_step(format!("addField({column})"), move |mut row: Row| {
            match compute(&row)?.into() {
                Computed::Value(v) => {
                    row.insert(column.as_str(), v);
                    Ok(row)
                }
                Computed::Reject(rejection) => Ok(row.with_rejection(rejection)),
            }
        })
    }

    pub fn remove_field(self, column: impl Into<String>) -> Self {
        self.remove_field_if(column, |_| true)
    }

    /// Remove `column` from rows for which `predicate` holds.
    pub fn remove_field_if<F>(self, column: impl Into<String>, mut predicate: F) -> Self
    where
        F: FnMut(&Row) -> bool + 'static,
    {
        let column = column.into();
        self.add_step(format!("removeField({column})"), move |mut row: Row| {
            if predicate(&row) {
                row.remove(&column);
            }
            Ok(row)
        })
    }

    /// Replace each row with one holding only `columns`, in that order.
    /// Missing columns come through as null.
    pub fn clip<S: Into<String>>(self, columns: impl IntoIterator<Item = S>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.add_step(render_name("clip", &columns), move |row: Row| {
            Ok(columns
                .iter()
                .map(|c| (c.as_str(), row.get(c).cloned().unwrap_or_default()))
                .collect::<Row>())
        })
    }

    /// Fill blank (absent, null or empty) columns with constants.
    pub fn default_values<K, V, I>(self, defaults: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let defaults: Vec<(String, Value)> = pairs(defaults)
            .into_iter()
            .map(|(k, v)| (k, v.into()))
            .collect();
        let keys: Vec<&str> = defaults.iter().map(|(k, _)| k.as_str()).collect();
        let name = render_name("defaultValues", &keys);
        self.add_step(name, move |mut row: Row| {
            for (column, value) in &defaults {
                if row.get(column).is_none_or(Value::is_blank) {
                    row.insert(column.as_str(), value.clone());
                }
            }
            Ok(row)
        })
    }

    /// Fill blank columns by copying another column of the same row.
    pub fn defaults_by<K, V, I>(self, defaults: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let defaults: Vec<(String, String)> = pairs(defaults)
            .into_iter()
            .map(|(k, v)| (k, v.into()))
            .collect();
        let keys: Vec<&str> = defaults.iter().map(|(k, _)| k.as_str()).collect();
        let name = render_name("defaultBy", &keys);
        self.add_step(name, move |mut row: Row| {
            for (column, from) in &defaults {
                if row.get(column).is_none_or(Value::is_blank) {
                    let value = row.get(from).cloned().unwrap_or_default();
                    row.insert(column.as_str(), value);
                }
            }
            Ok(row)
        })
    }
}
