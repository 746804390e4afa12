use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use tbase_core::Row;

/// One row returned for a lookup, with its match score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub row: Row,
    /// In `[0, 1]`; exact-key matches score `1.0`.
    pub score: f64,
    /// Columns that contributed to the match.
    pub matched_fields: BTreeSet<String>,
}

/// One input record of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRow {
    /// 1-based position among the data rows.
    pub row_index: usize,
    /// Raw values for the configured columns, by header name.
    pub values: BTreeMap<String, String>,
}

impl BatchRow {
    pub fn new(row_index: usize, values: BTreeMap<String, String>) -> Self {
        Self { row_index, values }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRow,
    InvalidPlan,
    Database,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidRow => "invalid_row",
            ErrorKind::InvalidPlan => "invalid_plan",
            ErrorKind::Database => "database",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// An empty candidate list is still a success.
    Succeeded { candidates: Vec<MatchCandidate> },
    Failed { reason: ErrorKind, detail: String },
}

impl BatchOutcome {
    pub fn failed(reason: ErrorKind, detail: impl Into<String>) -> Self {
        BatchOutcome::Failed {
            reason,
            detail: detail.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::failed(ErrorKind::Cancelled, "batch cancelled before this row ran")
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Succeeded { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            BatchOutcome::Succeeded { .. } => "succeeded",
            BatchOutcome::Failed { .. } => "failed",
        }
    }
}

/// Outcome of every batch row, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<(BatchRow, BatchOutcome)>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchResult {
    pub fn finalize(outcomes: Vec<(BatchRow, BatchOutcome)>) -> Self {
        let (success_count, failure_count) =
            outcomes
                .iter()
                .fold((0, 0), |(ok, failed), (_, outcome)| {
                    if outcome.is_success() {
                        (ok + 1, failed)
                    } else {
                        (ok, failed + 1)
                    }
                });
        Self {
            outcomes,
            success_count,
            failure_count,
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_counts_outcomes() {
        let row = |idx| BatchRow::new(idx, BTreeMap::new());
        let result = BatchResult::finalize(vec![
            (row(1), BatchOutcome::Succeeded { candidates: vec![] }),
            (row(2), BatchOutcome::failed(ErrorKind::InvalidRow, "bad date")),
            (row(3), BatchOutcome::cancelled()),
        ]);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 2);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn outcomes_serialize_with_status_tag() {
        let json = serde_json::to_value(BatchOutcome::failed(ErrorKind::Database, "08006: gone"))
            .expect("serialize");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "database");
        assert_eq!(json["detail"], "08006: gone");
    }
}
