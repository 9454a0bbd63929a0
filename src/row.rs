//! Rows and rejections.
//!
//! A [`Row`] is an insertion-ordered mapping from column name to [`Value`].
//! Column counts are small, so lookups are linear scans over a `Vec`; this
//! keeps the order stable without a hashing layer.
//!
//! A rejected row carries its [`Rejection`] as a marker outside the column
//! set. The pipeline consumes the marker exactly once when it routes the row,
//! turning it into statistics and the `rejectionCategory` / `rejectionReason`
//! / `rejectionStep` columns seen by a rejection pipeline.

use crate::value::Value;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Column added to a rejected row holding its [`RejectionCategory`].
pub const REJECTION_CATEGORY: &str = "rejectionCategory";
/// Column added to a rejected row holding the rejection reason.
pub const REJECTION_REASON: &str = "rejectionReason";
/// Column added to a rejected row holding the name of the rejecting step.
pub const REJECTION_STEP: &str = "rejectionStep";

/// Why a row left the success path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCategory {
    /// The row was filtered out on purpose (filter mismatch, duplicate, limit).
    IgnoreRow,
    /// A field could not be parsed into the requested type.
    InvalidFormat,
    /// A lookup the row depends on found nothing.
    ResourceNotFound,
    /// Generic rejection; also used when a step returns no row at all.
    Rejection,
}

impl RejectionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCategory::IgnoreRow => "IGNORE_ROW",
            RejectionCategory::InvalidFormat => "INVALID_FORMAT",
            RejectionCategory::ResourceNotFound => "RESOURCE_NOT_FOUND",
            RejectionCategory::Rejection => "REJECTION",
        }
    }
}

impl fmt::Display for RejectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized rejection. `step` is filled in by the pipeline when the
/// rejection is routed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub category: RejectionCategory,
    pub reason: String,
    pub step: Option<String>,
}

impl Rejection {
    pub fn new(reason: impl Into<String>, category: RejectionCategory) -> Self {
        Self {
            category,
            reason: reason.into(),
            step: None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => write!(f, "{} at {}: {}", self.category, step, self.reason),
            None => write!(f, "{}: {}", self.category, self.reason),
        }
    }
}

/// An ordered, string-keyed record.
#[derive(Clone, Debug, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
    rejection: Option<Box<Rejection>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
            rejection: None,
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set `key`, keeping its position if present, appending otherwise.
    /// Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.fields[i].1, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key).map(|i| self.fields.remove(i).1)
    }

    /// Rename `from` to `to` in place. A missing `from` is a no-op; an
    /// existing `to` column is replaced.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let Some(mut i) = self.position(from) else {
            return;
        };
        if let Some(j) = self.position(to) {
            self.fields.remove(j);
            if j < i {
                i -= 1;
            }
        }
        self.fields[i].0 = to.to_string();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.fields.iter_mut().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attach a rejection marker and hand the row back, for use as a step's
    /// return value.
    #[must_use]
    pub fn reject(mut self, reason: impl Into<String>, category: RejectionCategory) -> Self {
        self.rejection = Some(Box::new(Rejection::new(reason, category)));
        self
    }

    #[must_use]
    pub fn with_rejection(mut self, rejection: Rejection) -> Self {
        self.rejection = Some(Box::new(rejection));
        self
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_deref()
    }

    pub fn take_rejection(&mut self) -> Option<Rejection> {
        self.rejection.take().map(|b| *b)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a str, &'a Value);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Rows compare by their columns only; the rejection marker is transient.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Row {}

impl PartialOrd for Row {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Row {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fields.cmp(&other.fields)
    }
}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.hash(state);
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Build a [`Row`] from `key => value` pairs, preserving order.
///
/// ```
/// use rowflow::row;
/// let r = row! { "id" => 1, "name" => "Ada" };
/// assert_eq!(r.keys().collect::<Vec<_>>(), vec!["id", "name"]);
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($k:expr => $v:expr),+ $(,)?) => {{
        let mut r = $crate::Row::new();
        $( r.insert($k, $v); )+
        r
    }};
}
