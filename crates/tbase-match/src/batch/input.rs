//! CSV row source and per-row criteria builders.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tbase_core::{KeyValue, SearchCriteria, DOB_FORMAT};

use crate::config::CsvColumns;
use crate::errors::{BatchInputError, InvalidRowError};
use crate::model::BatchRow;

/// Lookup strategy applied to every row of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    Key,
    Demographic,
    /// Key lookup where the row has a key, demographic search otherwise.
    Auto,
}

impl BatchMode {
    /// CSV columns a row source must provide for this mode.
    pub fn required_columns(&self, columns: &CsvColumns) -> Vec<String> {
        match self {
            BatchMode::Key => vec![columns.key.clone()],
            BatchMode::Demographic => vec![
                columns.first_name.clone(),
                columns.last_name.clone(),
                columns.date_of_birth.clone(),
            ],
            BatchMode::Auto => vec![
                columns.key.clone(),
                columns.first_name.clone(),
                columns.last_name.clone(),
                columns.date_of_birth.clone(),
            ],
        }
    }
}

/// Read data rows from CSV with a header line.
///
/// Every name in `columns` must appear in the header; only those columns are
/// kept, trimmed. Rows shorter than the header yield empty values.
pub fn read_batch_rows<R: Read>(
    reader: R,
    columns: &[String],
) -> Result<Vec<BatchRow>, BatchInputError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut positions = Vec::with_capacity(columns.len());
    for column in columns {
        let idx = headers
            .iter()
            .position(|header| header == column)
            .ok_or_else(|| BatchInputError::MissingColumn(column.clone()))?;
        positions.push((column.clone(), idx));
    }

    let mut rows = Vec::new();
    for (offset, record) in csv_reader.records().enumerate() {
        let record = record?;
        let values: BTreeMap<String, String> = positions
            .iter()
            .map(|(column, idx)| {
                let value = record.get(*idx).unwrap_or_default().trim().to_string();
                (column.clone(), value)
            })
            .collect();
        rows.push(BatchRow::new(offset + 1, values));
    }
    Ok(rows)
}

pub fn read_batch_file(
    path: &Path,
    columns: &[String],
) -> Result<Vec<BatchRow>, BatchInputError> {
    let file = File::open(path)?;
    read_batch_rows(file, columns)
}

/// Builds exact-key criteria from `column`.
pub fn exact_key_builder(
    column: impl Into<String>,
) -> impl Fn(&BatchRow) -> Result<SearchCriteria, InvalidRowError> + Clone + Send + Sync + 'static
{
    let column = column.into();
    move |row: &BatchRow| {
        let raw = required(row, &column)?;
        let value = KeyValue::parse(raw)?;
        Ok(SearchCriteria::exact_key(value))
    }
}

/// Builds demographic criteria from the configured CSV columns.
pub fn demographic_builder(
    columns: CsvColumns,
    threshold: f64,
) -> impl Fn(&BatchRow) -> Result<SearchCriteria, InvalidRowError> + Clone + Send + Sync + 'static
{
    move |row: &BatchRow| {
        let first_name = required(row, &columns.first_name)?;
        let last_name = required(row, &columns.last_name)?;
        let raw_dob = required(row, &columns.date_of_birth)?;
        let date_of_birth = NaiveDate::parse_from_str(raw_dob, DOB_FORMAT).map_err(|_| {
            InvalidRowError::InvalidDate {
                column: columns.date_of_birth.clone(),
                format: DOB_FORMAT,
            }
        })?;
        Ok(SearchCriteria::demographic(
            first_name,
            last_name,
            date_of_birth,
            threshold,
        )?)
    }
}

/// Builds exact-key criteria when the key column is filled, and falls back
/// to demographic criteria when it is blank. A row with neither fails on the
/// key column.
pub fn fallback_builder(
    columns: CsvColumns,
    threshold: f64,
) -> impl Fn(&BatchRow) -> Result<SearchCriteria, InvalidRowError> + Clone + Send + Sync + 'static
{
    let by_key = exact_key_builder(columns.key.clone());
    let by_demographics = demographic_builder(columns.clone(), threshold);
    move |row: &BatchRow| {
        if required(row, &columns.key).is_ok() {
            return by_key(row);
        }
        let demographic = [
            &columns.first_name,
            &columns.last_name,
            &columns.date_of_birth,
        ];
        if demographic.iter().all(|column| required(row, column).is_err()) {
            return Err(InvalidRowError::BlankField(columns.key.clone()));
        }
        by_demographics(row)
    }
}

fn required<'a>(row: &'a BatchRow, column: &str) -> Result<&'a str, InvalidRowError> {
    match row.get(column).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(InvalidRowError::BlankField(column.to_string())),
    }
}
