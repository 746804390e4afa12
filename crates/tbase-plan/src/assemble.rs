use std::collections::HashSet;

use tbase_core::SqlValue;

use crate::errors::QueryError;
use crate::model::{Predicate, QueryPlan, SortDirection, Statement, TableSpec};
use crate::validate::is_valid_identifier;

/// Assemble a parameterized PostgreSQL statement from a validated plan.
///
/// Identifiers are re-checked against the allow-list and double-quoted;
/// every criteria value is bound as `$n` in `Statement::parameters`.
pub fn build_query(plan: &QueryPlan) -> Result<Statement, QueryError> {
    let anchor = plan.anchor().ok_or(QueryError::EmptyPlan)?;
    let anchor_alias = quote(&anchor.alias)?;
    let key_column = quote(&anchor.join_column)?;

    let mut select_parts = Vec::new();
    let mut projected: HashSet<String> = HashSet::new();
    let required = required_anchor_columns(plan, anchor);
    for spec in &plan.tables {
        push_projection(spec, &required, &mut select_parts, &mut projected)?;
    }

    let mut lines = vec![
        "SELECT".to_string(),
        format!("    {}", select_parts.join(",\n    ")),
        format!("FROM {}", table_reference(anchor)?),
    ];

    for spec in plan.tables.iter().skip(1) {
        lines.push(format!(
            "{} {} ON {anchor_alias}.{key_column} = {}.{}",
            plan.join_type.keyword(),
            table_reference(spec)?,
            quote(&spec.alias)?,
            quote(&spec.join_column)?,
        ));
    }

    let mut parameters = Vec::new();
    let mut conditions = Vec::new();
    match &plan.criteria {
        Predicate::All => {}
        Predicate::KeyEquals(value) => {
            // Text keys compare as text so integer-typed key columns never see a text bind.
            if plan.text_keys || value.is_text() {
                parameters.push(SqlValue::Text(value.to_string()));
                conditions.push(format!(
                    "{anchor_alias}.{key_column}::text = ${}",
                    parameters.len()
                ));
            } else {
                parameters.push(value.to_sql());
                conditions.push(format!(
                    "{anchor_alias}.{key_column} = ${}",
                    parameters.len()
                ));
            }
        }
        Predicate::Demographic {
            first_name,
            last_name,
            date_of_birth,
        } => {
            let columns = &plan.demographic_columns;
            let fields = [
                (&columns.first_name, first_name.clone().map(SqlValue::Text)),
                (&columns.last_name, last_name.clone().map(SqlValue::Text)),
                (&columns.date_of_birth, (*date_of_birth).map(SqlValue::Date)),
            ];
            for (column, value) in fields {
                let Some(value) = value else { continue };
                parameters.push(value);
                conditions.push(format!(
                    "{anchor_alias}.{} = ${}",
                    quote(column)?,
                    parameters.len()
                ));
            }
        }
    }
    if !conditions.is_empty() {
        lines.push(format!("WHERE {}", conditions.join("\n  AND ")));
    }

    if !plan.order_by.is_empty() {
        let mut keys = Vec::new();
        for order in &plan.order_by {
            let direction = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            keys.push(format!(
                "{}.{} {direction}",
                quote(&order.alias)?,
                quote(&order.column)?
            ));
        }
        lines.push(format!("ORDER BY {}", keys.join(", ")));
    }

    if let Some(limit) = plan.limit {
        lines.push(format!("LIMIT {limit}"));
    }

    Ok(Statement {
        text: lines.join("\n"),
        parameters,
    })
}

/// Anchor columns the matching engine reads back from every row.
///
/// The key is always needed for tie-breaks; demographic criteria also need the
/// name and birth date columns for scoring.
fn required_anchor_columns<'a>(plan: &'a QueryPlan, anchor: &'a TableSpec) -> Vec<&'a str> {
    let mut required = vec![anchor.join_column.as_str()];
    if matches!(plan.criteria, Predicate::Demographic { .. }) {
        let columns = &plan.demographic_columns;
        required.extend([
            columns.first_name.as_str(),
            columns.last_name.as_str(),
            columns.date_of_birth.as_str(),
        ]);
    }
    required
}

/// Explicit non-anchor columns whose name is already projected get a
/// `{table}_{column}` label. Of the names an anchor's `alias.*` brings in,
/// only the required anchor columns are tracked; other starred columns are
/// unknown without a catalog.
fn push_projection(
    spec: &TableSpec,
    required: &[&str],
    select_parts: &mut Vec<String>,
    projected: &mut HashSet<String>,
) -> Result<(), QueryError> {
    let alias = quote(&spec.alias)?;
    if spec.columns.is_empty() {
        select_parts.push(format!("{alias}.*"));
        if spec.is_anchor {
            projected.extend(required.iter().map(|column| column.to_string()));
        }
        return Ok(());
    }

    for column in &spec.columns {
        let qualified = format!("{alias}.{}", quote(column)?);
        if spec.is_anchor || projected.insert(column.clone()) {
            projected.insert(column.clone());
            select_parts.push(qualified);
        } else {
            let label = format!("{}_{column}", spec.table);
            select_parts.push(format!("{qualified} AS {}", quote(&label)?));
            projected.insert(label);
        }
    }

    if spec.is_anchor {
        for column in required {
            if !spec.columns.iter().any(|listed| listed == column) {
                select_parts.push(format!("{alias}.{}", quote(column)?));
                projected.insert(column.to_string());
            }
        }
    }
    Ok(())
}

fn table_reference(spec: &TableSpec) -> Result<String, QueryError> {
    Ok(format!(
        "{}.{} AS {}",
        quote(&spec.schema)?,
        quote(&spec.table)?,
        quote(&spec.alias)?
    ))
}

fn quote(identifier: &str) -> Result<String, QueryError> {
    if is_valid_identifier(identifier) {
        Ok(format!("\"{identifier}\""))
    } else {
        Err(QueryError::InvalidIdentifier(identifier.to_string()))
    }
}
