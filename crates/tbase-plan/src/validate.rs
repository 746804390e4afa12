use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use tbase_core::Catalog;

use crate::errors::{IssueKind, ValidationError, ValidationIssue};
use crate::model::{PlanOptions, Predicate, QueryPlan, TableSpec};

/// Allow-list for every identifier concatenated into SQL text.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn identifier_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(IDENTIFIER_PATTERN).ok())
        .as_ref()
}

/// Returns true when `value` may be interpolated into SQL as an identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    identifier_regex().is_some_and(|re| re.is_match(value))
}

/// Validate table specs and plan options into an immutable [`QueryPlan`].
///
/// Every problem is reported, not only the first. On success the anchor is
/// the first table and the plan matches every row (`Predicate::All`) until
/// the caller sets criteria.
pub fn validate_plan(
    specs: Vec<TableSpec>,
    options: &PlanOptions,
) -> Result<QueryPlan, ValidationError> {
    let mut report = ValidationError::default();

    if specs.is_empty() {
        report.push(ValidationIssue::new(
            IssueKind::EmptyPlan,
            "/tables",
            "plan requires at least one table",
        ));
        return Err(report);
    }

    let anchors: Vec<usize> = specs
        .iter()
        .enumerate()
        .filter(|(_, spec)| spec.is_anchor)
        .map(|(idx, _)| idx)
        .collect();
    match anchors.len() {
        0 => report.push(ValidationIssue::new(
            IssueKind::MissingAnchor,
            "/tables",
            "exactly one table must be the anchor; none is",
        )),
        1 => {}
        count => report.push(ValidationIssue::new(
            IssueKind::MultipleAnchors,
            "/tables",
            format!("exactly one table must be the anchor; {count} are"),
        )),
    }

    let mut aliases = HashSet::new();
    for (idx, spec) in specs.iter().enumerate() {
        let base_path = format!("/tables/{idx}");
        validate_table_identifiers(spec, &base_path, &mut report);
        if !aliases.insert(spec.alias.as_str()) {
            report.push(ValidationIssue::new(
                IssueKind::DuplicateAlias,
                format!("{base_path}/alias"),
                format!("alias '{}' is used by more than one table", spec.alias),
            ));
        }
    }

    for (idx, order) in options.order_by.iter().enumerate() {
        let base_path = format!("/order_by/{idx}");
        check_identifier(&order.alias, &format!("{base_path}/alias"), &mut report);
        check_identifier(&order.column, &format!("{base_path}/column"), &mut report);
        if !aliases.contains(order.alias.as_str()) {
            report.push(ValidationIssue::new(
                IssueKind::UnknownOrderAlias,
                format!("{base_path}/alias"),
                format!("order-by alias '{}' does not name a plan table", order.alias),
            ));
        }
    }

    if options.limit == Some(0) {
        report.push(ValidationIssue::new(
            IssueKind::InvalidLimit,
            "/limit",
            "limit must be a positive integer",
        ));
    }

    let columns = &options.demographic_columns;
    check_identifier(&columns.first_name, "/demographic_columns/first_name", &mut report);
    check_identifier(&columns.last_name, "/demographic_columns/last_name", &mut report);
    check_identifier(
        &columns.date_of_birth,
        "/demographic_columns/date_of_birth",
        &mut report,
    );

    if !report.is_empty() {
        return Err(report);
    }

    let mut tables = specs;
    if let Some(anchor_idx) = anchors.first().copied() {
        let anchor = tables.remove(anchor_idx);
        tables.insert(0, anchor);
    }

    Ok(QueryPlan {
        tables,
        join_type: options.join_type,
        order_by: options.order_by.clone(),
        limit: options.limit,
        demographic_columns: options.demographic_columns.clone(),
        text_keys: options.text_keys,
        criteria: Predicate::All,
    })
}

fn validate_table_identifiers(spec: &TableSpec, base_path: &str, report: &mut ValidationError) {
    check_identifier(&spec.schema, &format!("{base_path}/schema"), report);
    check_identifier(&spec.table, &format!("{base_path}/table"), report);
    check_identifier(&spec.alias, &format!("{base_path}/alias"), report);
    check_identifier(&spec.join_column, &format!("{base_path}/join_column"), report);
    for (col_idx, column) in spec.columns.iter().enumerate() {
        check_identifier(column, &format!("{base_path}/columns/{col_idx}"), report);
    }
}

fn check_identifier(value: &str, path: &str, report: &mut ValidationError) {
    if !is_valid_identifier(value) {
        report.push(ValidationIssue::new(
            IssueKind::InvalidIdentifier,
            path,
            format!("'{value}' does not match {IDENTIFIER_PATTERN}"),
        ));
    }
}

/// Check a validated plan against an introspected catalog.
///
/// Reports tables the catalog does not contain and selected, join, sort, or
/// demographic columns missing from their table.
pub fn check_plan_against_catalog(
    plan: &QueryPlan,
    catalog: &Catalog,
) -> Result<(), ValidationError> {
    let mut report = ValidationError::default();

    for (idx, spec) in plan.tables.iter().enumerate() {
        let base_path = format!("/tables/{idx}");
        let Some(table) = catalog.table(&spec.schema, &spec.table) else {
            report.push(ValidationIssue::new(
                IssueKind::UnknownTable,
                format!("{base_path}/table"),
                format!("table '{}.{}' not found in catalog", spec.schema, spec.table),
            ));
            continue;
        };

        let mut required: Vec<(String, &str)> =
            vec![(format!("{base_path}/join_column"), spec.join_column.as_str())];
        for (col_idx, column) in spec.columns.iter().enumerate() {
            required.push((format!("{base_path}/columns/{col_idx}"), column.as_str()));
        }
        if spec.is_anchor {
            let columns = &plan.demographic_columns;
            required.push((
                "/demographic_columns/first_name".to_string(),
                columns.first_name.as_str(),
            ));
            required.push((
                "/demographic_columns/last_name".to_string(),
                columns.last_name.as_str(),
            ));
            required.push((
                "/demographic_columns/date_of_birth".to_string(),
                columns.date_of_birth.as_str(),
            ));
        }
        for (order_idx, order) in plan.order_by.iter().enumerate() {
            if order.alias == spec.alias {
                required.push((format!("/order_by/{order_idx}/column"), order.column.as_str()));
            }
        }

        for (path, column) in required {
            if !table.has_column(column) {
                report.push(ValidationIssue::new(
                    IssueKind::UnknownColumn,
                    path,
                    format!(
                        "column '{column}' not found in '{}.{}'",
                        spec.schema, spec.table
                    ),
                ));
            }
        }
    }

    if report.is_empty() { Ok(()) } else { Err(report) }
}

/// True when the catalog types the anchor's key column as character data.
pub fn key_column_is_text(plan: &QueryPlan, catalog: &Catalog) -> bool {
    let Some(anchor) = plan.anchor() else {
        return false;
    };
    catalog
        .table(&anchor.schema, &anchor.table)
        .and_then(|table| {
            table
                .columns
                .iter()
                .find(|column| column.name == anchor.join_column)
        })
        .is_some_and(|column| {
            matches!(
                column.data_type.as_str(),
                "text" | "character varying" | "character" | "name"
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_allow_list() {
        assert!(is_valid_identifier("PatientID"));
        assert!(is_valid_identifier("_tmp1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("Patient; DROP TABLE x"));
        assert!(!is_valid_identifier("a.b"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("Näme"));
    }
}
