use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A typed value read from, or bound to, the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short type label used when parameters are logged.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Integer(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Date(_) => "date",
            SqlValue::DateTime(_) => "datetime",
            SqlValue::Text(_) => "text",
        }
    }

    /// Text form for string comparison; `None` for null.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Calendar date carried by the value, parsing text in `%Y-%m-%d`.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Date(date) => Some(*date),
            SqlValue::DateTime(datetime) => Some(datetime.date()),
            SqlValue::Text(text) => NaiveDate::parse_from_str(text.trim(), crate::DOB_FORMAT).ok(),
            _ => None,
        }
    }

    /// Total order used to break ranking ties on key columns.
    ///
    /// Numbers compare numerically, everything else by its text form, and
    /// nulls sort last.
    pub fn key_cmp(&self, other: &SqlValue) -> Ordering {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => Ordering::Equal,
            (SqlValue::Null, _) => Ordering::Greater,
            (_, SqlValue::Null) => Ordering::Less,
            (SqlValue::Integer(left), SqlValue::Integer(right)) => left.cmp(right),
            (SqlValue::Integer(_) | SqlValue::Float(_), SqlValue::Integer(_) | SqlValue::Float(_)) => {
                let left = self.as_f64().unwrap_or_default();
                let right = other.as_f64().unwrap_or_default();
                left.total_cmp(&right)
            }
            (SqlValue::Date(left), SqlValue::Date(right)) => left.cmp(right),
            (SqlValue::DateTime(left), SqlValue::DateTime(right)) => left.cmp(right),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(value) => Some(*value as f64),
            SqlValue::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(value) => write!(f, "{value}"),
            SqlValue::Integer(value) => write!(f, "{value}"),
            SqlValue::Float(value) => write!(f, "{value}"),
            SqlValue::Date(value) => write!(f, "{}", value.format(crate::DOB_FORMAT)),
            SqlValue::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S%.f")),
            SqlValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

/// One result row: column labels in select order with their values.
///
/// Labels may repeat when several tables are projected with `alias.*`;
/// lookups return the first occurrence, which belongs to the anchor table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, value: SqlValue) {
        self.columns.push((label.into(), value));
    }

    pub fn get(&self, label: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
