use std::fmt;

use thiserror::Error;

/// Table specification text that does not follow
/// `schema.table[:alias][[col1,col2,...]][@joinColumn]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed table spec '{spec}': {reason}")]
pub struct MalformedSpecError {
    pub spec: String,
    pub reason: String,
}

impl MalformedSpecError {
    pub fn new(spec: &str, reason: impl Into<String>) -> Self {
        Self {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// Join type text outside INNER, LEFT, RIGHT, FULL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported join type '{0}' (expected inner, left, right or full)")]
pub struct UnsupportedJoinError(pub String);

/// Order-by text that is not `alias.column[:asc|:desc]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed order-by '{0}' (expected alias.column[:asc|:desc])")]
pub struct MalformedOrderError(pub String);

/// Category of a plan validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    EmptyPlan,
    MissingAnchor,
    MultipleAnchors,
    DuplicateAlias,
    InvalidIdentifier,
    UnknownOrderAlias,
    InvalidLimit,
    UnknownTable,
    UnknownColumn,
}

impl IssueKind {
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::EmptyPlan => "empty_plan",
            IssueKind::MissingAnchor => "missing_anchor",
            IssueKind::MultipleAnchors => "multiple_anchors",
            IssueKind::DuplicateAlias => "duplicate_alias",
            IssueKind::InvalidIdentifier => "invalid_identifier",
            IssueKind::UnknownOrderAlias => "unknown_order_alias",
            IssueKind::InvalidLimit => "invalid_limit",
            IssueKind::UnknownTable => "unknown_table",
            IssueKind::UnknownColumn => "unknown_column",
        }
    }
}

/// Structured validation issue with location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.code(), self.path, self.message)
    }
}

/// A plan was rejected; carries every issue found in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan validation failed with {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Statement assembly failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("plan has no anchor table")]
    EmptyPlan,
    #[error("identifier '{0}' is not allowed in SQL text")]
    InvalidIdentifier(String),
}
