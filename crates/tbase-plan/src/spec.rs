//! Textual table specifications.
//!
//! Grammar: `schema.table[:alias][[col1,col2,...]][@joinColumn]`, for example
//! `dbo.Diagnose:d[ICD10,Bezeichnung]@PatientID`. Parsing only checks the
//! shape of the text; identifier allow-listing happens in
//! [`crate::validate_plan`].

use crate::errors::MalformedSpecError;
use crate::model::TableSpec;

/// Parse one table specification.
///
/// The alias defaults to the table name and the join column to
/// `default_join_column`. The returned spec is never an anchor; see
/// [`parse_table_specs`].
pub fn parse_table_spec(
    spec: &str,
    default_join_column: &str,
) -> Result<TableSpec, MalformedSpecError> {
    let text = spec.trim();
    if text.is_empty() {
        return Err(MalformedSpecError::new(spec, "specification is empty"));
    }

    let (head, join_column) = match text.rsplit_once('@') {
        Some((head, join)) => {
            let join = join.trim();
            if join.is_empty() {
                return Err(MalformedSpecError::new(spec, "join column after '@' is empty"));
            }
            if head.contains('@') {
                return Err(MalformedSpecError::new(spec, "more than one '@'"));
            }
            if join.contains(['[', ']', ':']) {
                return Err(MalformedSpecError::new(
                    spec,
                    "join column must be the last element",
                ));
            }
            (head, join.to_string())
        }
        None => (text, default_join_column.to_string()),
    };

    let (head, columns) = split_columns(spec, head.trim_end())?;

    let (qualified, alias) = match head.rsplit_once(':') {
        Some((qualified, alias)) => {
            let alias = alias.trim();
            if alias.is_empty() {
                return Err(MalformedSpecError::new(spec, "alias after ':' is empty"));
            }
            if qualified.contains(':') {
                return Err(MalformedSpecError::new(spec, "more than one ':'"));
            }
            (qualified, Some(alias.to_string()))
        }
        None => (head, None),
    };

    let Some((schema, table)) = qualified.trim().split_once('.') else {
        return Err(MalformedSpecError::new(spec, "expected schema.table"));
    };
    let (schema, table) = (schema.trim(), table.trim());
    if schema.is_empty() || table.is_empty() {
        return Err(MalformedSpecError::new(spec, "schema and table must not be empty"));
    }
    if table.contains('.') {
        return Err(MalformedSpecError::new(spec, "more than one '.' in schema.table"));
    }

    Ok(TableSpec {
        schema: schema.to_string(),
        table: table.to_string(),
        alias: alias.unwrap_or_else(|| table.to_string()),
        columns,
        join_column,
        is_anchor: false,
    })
}

fn split_columns<'a>(
    spec: &str,
    head: &'a str,
) -> Result<(&'a str, Vec<String>), MalformedSpecError> {
    let Some(body) = head.strip_suffix(']') else {
        if head.contains(['[', ']']) {
            return Err(MalformedSpecError::new(
                spec,
                "column list must follow the alias and precede '@'",
            ));
        }
        return Ok((head, Vec::new()));
    };

    let Some(open) = body.find('[') else {
        return Err(MalformedSpecError::new(spec, "unbalanced ']'"));
    };
    let (rest, list) = (&body[..open], &body[open + 1..]);
    if list.contains(['[', ']']) || rest.contains(']') {
        return Err(MalformedSpecError::new(spec, "nested or repeated brackets"));
    }
    if list.trim().is_empty() {
        return Err(MalformedSpecError::new(
            spec,
            "column list is empty; omit the brackets to select all columns",
        ));
    }

    let mut columns = Vec::new();
    for column in list.split(',') {
        let column = column.trim();
        if column.is_empty() {
            return Err(MalformedSpecError::new(spec, "empty entry in column list"));
        }
        columns.push(column.to_string());
    }
    Ok((rest, columns))
}

/// Parse an ordered list of specifications; the first becomes the anchor.
pub fn parse_table_specs<I, S>(
    specs: I,
    default_join_column: &str,
) -> Result<Vec<TableSpec>, MalformedSpecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = Vec::new();
    for (idx, spec) in specs.into_iter().enumerate() {
        let mut table = parse_table_spec(spec.as_ref(), default_join_column)?;
        table.is_anchor = idx == 0;
        parsed.push(table);
    }
    Ok(parsed)
}

impl TableSpec {
    /// Canonical text form; [`parse_table_spec`] reads it back unchanged.
    pub fn render(&self) -> String {
        let mut text = format!("{}.{}:{}", self.schema, self.table, self.alias);
        if !self.columns.is_empty() {
            text.push('[');
            text.push_str(&self.columns.join(","));
            text.push(']');
        }
        text.push('@');
        text.push_str(&self.join_column);
        text
    }
}
