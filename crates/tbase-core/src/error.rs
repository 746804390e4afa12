use thiserror::Error;

/// Failure reported by a database executor.
///
/// `message` never contains the values bound to the statement; executors
/// scrub them before constructing this error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database error [{sql_state}]: {message}")]
pub struct DatabaseError {
    /// SQLSTATE code, or a short driver-level code when the backend gave none.
    pub sql_state: String,
    pub message: String,
}

impl DatabaseError {
    pub fn new(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }

    /// `sqlstate: message`, the form recorded in batch outcomes.
    pub fn detail(&self) -> String {
        format!("{}: {}", self.sql_state, self.message)
    }
}

/// Search criteria rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CriteriaError {
    #[error("field '{0}' must not be blank")]
    BlankField(&'static str),
    #[error("threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f64),
    #[error("key value must not be blank")]
    BlankKey,
}
