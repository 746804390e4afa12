use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CriteriaError;
use crate::value::SqlValue;

/// Value of an entity key. Only canonical integers are bound as integers so
/// that keys such as `007` keep their leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Integer(i64),
    Text(String),
}

impl KeyValue {
    /// Parse raw input; surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, CriteriaError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CriteriaError::BlankKey);
        }
        Ok(match trimmed.parse::<i64>() {
            Ok(value) if value.to_string() == trimmed => KeyValue::Integer(value),
            _ => KeyValue::Text(trimmed.to_string()),
        })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, KeyValue::Text(_))
    }

    pub fn to_sql(&self) -> SqlValue {
        match self {
            KeyValue::Integer(value) => SqlValue::Integer(*value),
            KeyValue::Text(value) => SqlValue::Text(value.clone()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Integer(value) => write!(f, "{value}"),
            KeyValue::Text(value) => f.write_str(value),
        }
    }
}

/// Demographic search input. Fields are private so the invariants checked in
/// [`DemographicCriteria::new`] hold for the lifetime of the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicCriteria {
    first_name: String,
    last_name: String,
    date_of_birth: NaiveDate,
    threshold: f64,
}

impl DemographicCriteria {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: NaiveDate,
        threshold: f64,
    ) -> Result<Self, CriteriaError> {
        let first_name = first_name.into().trim().to_string();
        let last_name = last_name.into().trim().to_string();
        if first_name.is_empty() {
            return Err(CriteriaError::BlankField("first_name"));
        }
        if last_name.is_empty() {
            return Err(CriteriaError::BlankField("last_name"));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CriteriaError::ThresholdOutOfRange(threshold));
        }
        Ok(Self {
            first_name,
            last_name,
            date_of_birth,
            threshold,
        })
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// How an entity is looked up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchCriteria {
    ExactKey { value: KeyValue },
    Demographic(DemographicCriteria),
}

impl SearchCriteria {
    pub fn exact_key(value: KeyValue) -> Self {
        SearchCriteria::ExactKey { value }
    }

    pub fn demographic(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: NaiveDate,
        threshold: f64,
    ) -> Result<Self, CriteriaError> {
        DemographicCriteria::new(first_name, last_name, date_of_birth, threshold)
            .map(SearchCriteria::Demographic)
    }

    /// Label used in logs; never includes the criteria values.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchCriteria::ExactKey { .. } => "exact_key",
            SearchCriteria::Demographic(_) => "demographic",
        }
    }
}
