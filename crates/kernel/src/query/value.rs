//! Typed scalar values flowing through filters, rows, and cursors.
//!
//! Values carry the exact representation of the underlying column so that
//! dates, large integers, and decimals survive a round trip through cursor
//! strings and query-string parameters without loss of precision.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

/// Storage kind of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// 16/32/64-bit integer.
    Integer,
    /// Fixed-point `NUMERIC`.
    Decimal,
    /// Text or varchar.
    Text,
    /// Calendar date.
    Date,
    /// Timestamp without time zone.
    Timestamp,
    /// Boolean.
    Boolean,
    /// Pre-built full-text search vector (`tsvector`).
    TextSearch,
}

impl ColumnKind {
    /// Human-readable name used in error messages.
    pub fn describe(self) -> &'static str {
        match self {
            ColumnKind::Integer => "an integer",
            ColumnKind::Decimal => "a decimal number",
            ColumnKind::Text => "text",
            ColumnKind::Date => "a date (YYYY-MM-DD)",
            ColumnKind::Timestamp => "a timestamp (YYYY-MM-DDTHH:MM:SS)",
            ColumnKind::Boolean => "true or false",
            ColumnKind::TextSearch => "search text",
        }
    }

    /// Whether values of this kind are selected into result rows.
    pub fn is_selectable(self) -> bool {
        self != ColumnKind::TextSearch
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// A string could not be parsed as the requested column kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueParseError {
    pub kind: ColumnKind,
    pub input: String,
}

impl fmt::Display for ValueParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not {}", self.input, self.kind.describe())
    }
}

impl std::error::Error for ValueParseError {}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl Value {
    /// Parse a transport string as a value of `kind`.
    ///
    /// Text-search columns accept their input as plain text.
    pub fn parse(kind: ColumnKind, input: &str) -> Result<Self, ValueParseError> {
        let fail = || ValueParseError {
            kind,
            input: input.to_string(),
        };
        let trimmed = input.trim();

        match kind {
            ColumnKind::Text | ColumnKind::TextSearch => Ok(Value::Text(input.to_string())),
            ColumnKind::Integer => trimmed.parse().map(Value::Integer).map_err(|_| fail()),
            ColumnKind::Decimal => Decimal::from_str_exact(trimmed)
                .or_else(|_| trimmed.parse::<Decimal>())
                .map(Value::Decimal)
                .map_err(|_| fail()),
            ColumnKind::Date => parse_date(trimmed).map(Value::Date).ok_or_else(fail),
            ColumnKind::Timestamp => TIMESTAMP_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(trimmed, f).ok())
                .or_else(|| parse_date(trimmed).and_then(|d| d.and_hms_opt(0, 0, 0)))
                .map(Value::Timestamp)
                .ok_or_else(fail),
            ColumnKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(fail()),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Exact string form used by cursors. `None` for null.
    pub fn to_cursor_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(t) => Some(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        }
    }

    /// Total order used for in-memory sorting and comparison.
    ///
    /// Null sorts after every non-null value, matching PostgreSQL's default
    /// `NULLS LAST` for ascending order. Integers and decimals compare
    /// numerically; other mixed kinds fall back to a fixed kind rank.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),
            (Value::Integer(a), Value::Decimal(b)) => Decimal::from(*a).cmp(b),
            (Value::Decimal(a), Value::Integer(b)) => a.cmp(&Decimal::from(*b)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Date(a), Value::Timestamp(b)) => a.and_time(chrono::NaiveTime::MIN).cmp(b),
            (Value::Timestamp(a), Value::Date(b)) => a.cmp(&b.and_time(chrono::NaiveTime::MIN)),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Integer(_) | Value::Decimal(_) => 1,
            Value::Text(_) => 2,
            Value::Date(_) | Value::Timestamp(_) => 3,
            Value::Null => 4,
        }
    }
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(input, f).ok())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_cursor_string() {
            Some(s) => f.write_str(&s),
            None => f.write_str("null"),
        }
    }
}

// Decimals serialize as strings so no consumer ever sees a rounded float.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Text(s) => serializer.serialize_str(s),
            other => match other.to_cursor_string() {
                Some(s) => serializer.serialize_str(&s),
                None => serializer.serialize_none(),
            },
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
