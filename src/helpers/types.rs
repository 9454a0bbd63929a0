//! Text-to-typed conversions.
//!
//! Each step looks only at [`Value::Text`] fields: null, absent and already
//! typed values pass through untouched. Unparsable text rejects the row as
//! `INVALID_FORMAT`, leaving the original text in the row that reaches the
//! rejection pipeline.

use crate::pipeline::Pipeline;
use crate::row::{RejectionCategory, Row};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime};

/// Date format used by [`Pipeline::as_date`].
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const TRUTHY: &[&str] = &["y", "yes", "1", "t", "true"];

/// Map a token onto a boolean, case-insensitively. Anything outside the
/// truthy vocabulary is `false`.
pub fn parse_bool(text: &str) -> bool {
    TRUTHY.contains(&text.trim().to_ascii_lowercase().as_str())
}

fn parse_date(text: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

impl Pipeline {
    fn convert_text<F>(self, name: String, column: String, mut convert: F) -> Self
    where
        F: FnMut(&str) -> Result<Value, String> + 'static,
    {
        self.add_step(name, move |mut row: Row| {
            let Some(Value::Text(text)) = row.get(&column) else {
                return Ok(row);
            };
            match convert(text) {
                Ok(value) => {
                    row.insert(column.as_str(), value);
                    Ok(row)
                }
                Err(reason) => Ok(row.reject(reason, RejectionCategory::InvalidFormat)),
            }
        })
    }

    /// Parse `column` as a 64-bit integer.
    pub fn as_int(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.convert_text(format!("asInt({column})"), column, |text| {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("Could not parse {text} to an integer."))
        })
    }

    /// Parse `column` as a float. Surrounding whitespace is ignored.
    pub fn as_double(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.convert_text(format!("asDouble({column})"), column, |text| {
            text.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("Could not parse {text} as a Double"))
        })
    }

    /// Parse `column` as a boolean. Never rejects.
    ///
    /// `y`, `yes`, `t`, `true` and `1` are true in any case; every other
    /// token, including `n`, `no`, `f`, `0` and `null`, is false.
    pub fn as_boolean(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.convert_text(format!("asBoolean({column})"), column, |text| {
            Ok(Value::Bool(parse_bool(text)))
        })
    }

    /// Parse `column` as a date with [`DEFAULT_DATE_FORMAT`].
    pub fn as_date(self, column: impl Into<String>) -> Self {
        self.as_date_with(column, DEFAULT_DATE_FORMAT)
    }

    /// Parse `column` with a `chrono` format string. Formats without a time
    /// component produce midnight.
    pub fn as_date_with(self, column: impl Into<String>, format: impl Into<String>) -> Self {
        let column = column.into();
        let format = format.into();
        let name = format!("asDate({column}, {format})");
        self.convert_text(name, column, move |text| {
            parse_date(text, &format)
                .map(Value::Date)
                .ok_or_else(|| format!("{text} could not be parsed by format {format}"))
        })
    }
}
