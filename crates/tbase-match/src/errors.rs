use thiserror::Error;

use tbase_core::{CriteriaError, DatabaseError};
use tbase_plan::QueryError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("query assembly failed: {0}")]
    Query(#[from] QueryError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A batch row that cannot be turned into search criteria.
///
/// Messages name the offending column but never repeat its value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRowError {
    #[error("column '{0}' is missing or blank")]
    BlankField(String),
    #[error("column '{column}' is not a date in {format} format")]
    InvalidDate { column: String, format: &'static str },
    #[error(transparent)]
    Criteria(#[from] CriteriaError),
}

#[derive(Debug, Error)]
pub enum BatchInputError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input is missing required column '{0}'")]
    MissingColumn(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
