//! Table specifications, plan validation, and parameterized query assembly.
//!
//! The pipeline is `parse_table_specs` → `validate_plan` → `build_query`.
//! Identifiers are checked against a strict allow-list during validation and
//! again while assembling; values only ever travel as bound parameters.

pub mod assemble;
pub mod errors;
pub mod model;
pub mod spec;
pub mod validate;

pub use assemble::build_query;
pub use errors::{
    IssueKind, MalformedOrderError, MalformedSpecError, QueryError, UnsupportedJoinError,
    ValidationError, ValidationIssue,
};
pub use model::{
    DemographicColumns, JoinType, OrderBy, PlanOptions, Predicate, QueryPlan, SortDirection,
    Statement, TableSpec,
};
pub use spec::{parse_table_spec, parse_table_specs};
pub use validate::{
    check_plan_against_catalog, is_valid_identifier, key_column_is_text, validate_plan,
    IDENTIFIER_PATTERN,
};
