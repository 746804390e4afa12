//! Read-only catalog browsing over `information_schema`.
//!
//! Every schema, table, and pattern argument is a bound parameter.

use serde::Serialize;
use sqlx::PgPool;

use tbase_core::{Catalog, CatalogColumn, CatalogTable, DatabaseError};

use super::queries::{self, RawColumn};

/// Default pattern for columns that hold the patient key.
pub const DEFAULT_KEY_PATTERN: &str = "%patient%id%";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub schema: String,
    pub name: String,
    pub column_count: i64,
}

/// A table carrying a column that matches the key pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyTable {
    pub schema: String,
    pub name: String,
    pub key_column: String,
}

/// List base tables, optionally limited to one schema.
pub async fn list_tables(
    pool: &PgPool,
    schema: Option<&str>,
) -> Result<Vec<TableSummary>, DatabaseError> {
    let raw = queries::list_tables(pool, schema).await?;
    Ok(raw
        .into_iter()
        .map(|table| TableSummary {
            schema: table.schema,
            name: table.name,
            column_count: table.column_count,
        })
        .collect())
}

pub async fn list_columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<CatalogColumn>, DatabaseError> {
    let raw = queries::list_columns(pool, schema, table).await?;
    Ok(map_columns(raw))
}

/// Tables in `schema` with a column matching `key_pattern` (`ILIKE` syntax).
///
/// A table with several matching columns is reported once, with its first
/// matching column.
pub async fn discover_key_tables(
    pool: &PgPool,
    schema: &str,
    key_pattern: &str,
) -> Result<Vec<KeyTable>, DatabaseError> {
    let raw = queries::list_key_columns(pool, schema, key_pattern).await?;
    let mut tables: Vec<KeyTable> = Vec::new();
    for column in raw {
        if tables
            .iter()
            .any(|table| table.schema == column.schema && table.name == column.name)
        {
            continue;
        }
        tables.push(KeyTable {
            schema: column.schema,
            name: column.name,
            key_column: column.key_column,
        });
    }
    Ok(tables)
}

/// Load every base table of `schema` with its columns.
pub async fn load_catalog(pool: &PgPool, schema: &str) -> Result<Catalog, DatabaseError> {
    let summaries = queries::list_tables(pool, Some(schema)).await?;
    let mut tables = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let columns = queries::list_columns(pool, &summary.schema, &summary.name).await?;
        tables.push(CatalogTable {
            schema: summary.schema,
            name: summary.name,
            columns: map_columns(columns),
        });
    }
    tracing::debug!(event = "catalog_loaded", schema = schema, tables = tables.len());
    Ok(Catalog::new(tables))
}

fn map_columns(raw: Vec<RawColumn>) -> Vec<CatalogColumn> {
    raw.into_iter()
        .map(|column| CatalogColumn {
            ordinal_position: column.ordinal_position,
            name: column.name,
            data_type: column.data_type,
            is_nullable: column.is_nullable,
            default: column.default,
        })
        .collect()
}
