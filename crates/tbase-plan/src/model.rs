use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tbase_core::{DemographicCriteria, KeyValue, SearchCriteria, SqlValue};

use crate::errors::{MalformedOrderError, UnsupportedJoinError};

/// One table's participation in a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub schema: String,
    pub table: String,
    /// Alias used to qualify columns; unique within a plan.
    pub alias: String,
    /// Columns to select; empty selects every column.
    pub columns: Vec<String>,
    /// Column relating this table to the anchor. On the anchor itself this is
    /// the entity key column.
    pub join_column: String,
    pub is_anchor: bool,
}

/// Join used for every non-anchor table of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
        }
    }
}

impl FromStr for JoinType {
    type Err = UnsupportedJoinError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INNER" => Ok(JoinType::Inner),
            "LEFT" => Ok(JoinType::Left),
            "RIGHT" => Ok(JoinType::Right),
            "FULL" => Ok(JoinType::Full),
            _ => Err(UnsupportedJoinError(value.to_string())),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A qualified `alias.column` sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub alias: String,
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl FromStr for OrderBy {
    type Err = MalformedOrderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedOrderError(value.to_string());
        let (qualified, direction) = match value.rsplit_once(':') {
            Some((qualified, direction)) => {
                let direction = match direction.trim().to_ascii_lowercase().as_str() {
                    "asc" => SortDirection::Asc,
                    "desc" => SortDirection::Desc,
                    _ => return Err(malformed()),
                };
                (qualified, direction)
            }
            None => (value, SortDirection::Asc),
        };
        let (alias, column) = qualified.trim().split_once('.').ok_or_else(malformed)?;
        if alias.is_empty() || column.is_empty() {
            return Err(malformed());
        }
        Ok(OrderBy {
            alias: alias.to_string(),
            column: column.to_string(),
            direction,
        })
    }
}

/// Anchor columns holding the demographic fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicColumns {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
}

impl Default for DemographicColumns {
    fn default() -> Self {
        Self {
            first_name: "Vorname".to_string(),
            last_name: "Name".to_string(),
            date_of_birth: "Geburtsdatum".to_string(),
        }
    }
}

/// WHERE-clause shape of a plan.
///
/// Demographic fields are emitted in the fixed order first name, last name,
/// date of birth; absent fields are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Predicate {
    #[default]
    All,
    KeyEquals(KeyValue),
    Demographic {
        first_name: Option<String>,
        last_name: Option<String>,
        date_of_birth: Option<NaiveDate>,
    },
}

impl Predicate {
    /// Predicate matching only the date of birth, used to fetch fuzzy candidates.
    pub fn date_of_birth(date: NaiveDate) -> Self {
        Predicate::Demographic {
            first_name: None,
            last_name: None,
            date_of_birth: Some(date),
        }
    }

    /// Demographic predicate without fields: matches every row but still
    /// projects the demographic columns.
    pub fn demographic_scan() -> Self {
        Predicate::Demographic {
            first_name: None,
            last_name: None,
            date_of_birth: None,
        }
    }
}

impl From<&DemographicCriteria> for Predicate {
    /// Exact equality on all three demographic fields.
    fn from(criteria: &DemographicCriteria) -> Self {
        Predicate::Demographic {
            first_name: Some(criteria.first_name().to_string()),
            last_name: Some(criteria.last_name().to_string()),
            date_of_birth: Some(criteria.date_of_birth()),
        }
    }
}

impl From<&SearchCriteria> for Predicate {
    fn from(criteria: &SearchCriteria) -> Self {
        match criteria {
            SearchCriteria::ExactKey { value } => Predicate::KeyEquals(value.clone()),
            SearchCriteria::Demographic(demographic) => Predicate::from(demographic),
        }
    }
}

/// Plan-level settings applied by [`crate::validate_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    pub join_type: JoinType,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub demographic_columns: DemographicColumns,
    /// Compare every key as text, for schemas with character key columns.
    #[serde(default)]
    pub text_keys: bool,
}

/// A validated, immutable join plan over one anchor and its related tables.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Anchor first, then related tables in declaration order.
    pub tables: Vec<TableSpec>,
    pub join_type: JoinType,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub demographic_columns: DemographicColumns,
    pub text_keys: bool,
    pub criteria: Predicate,
}

impl QueryPlan {
    pub fn anchor(&self) -> Option<&TableSpec> {
        self.tables.first().filter(|spec| spec.is_anchor)
    }

    /// Entity key column of the anchor.
    pub fn key_column(&self) -> Option<&str> {
        self.anchor().map(|anchor| anchor.join_column.as_str())
    }

    /// Copy of this plan filtering by `criteria`.
    pub fn with_criteria(&self, criteria: Predicate) -> Self {
        Self {
            criteria,
            ..self.clone()
        }
    }

    pub fn with_text_keys(&self, text_keys: bool) -> Self {
        Self {
            text_keys,
            ..self.clone()
        }
    }

    /// Copy of this plan with a different row limit.
    pub fn with_limit(&self, limit: Option<u32>) -> Self {
        Self {
            limit,
            ..self.clone()
        }
    }
}

/// Parameterized SQL ready for an executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    /// Values bound to `$1..$n`, in placeholder order.
    pub parameters: Vec<SqlValue>,
}
