#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use tbase_core::{DatabaseError, Row, SqlValue};
use tbase_db::{Executor, ExecutorFactory};
use tbase_match::{CancelSignal, MatchConfig};
use tbase_plan::{parse_table_specs, validate_plan, QueryPlan};

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("test date")
}

pub fn patient(id: i64, first: &str, last: &str, dob: &str) -> Row {
    Row::from_iter([
        ("PatientID", SqlValue::Integer(id)),
        ("Vorname", SqlValue::Text(first.to_string())),
        ("Name", SqlValue::Text(last.to_string())),
        ("Geburtsdatum", SqlValue::Date(date(dob))),
    ])
}

pub fn template(config: &MatchConfig) -> QueryPlan {
    let specs = parse_table_specs(["dbo.Patient:p"], &config.key_column).expect("specs");
    validate_plan(specs, &config.plan_options()).expect("plan")
}

/// In-memory stand-in for the database.
///
/// Each `"Column" = $n` condition of the statement is applied to the rows;
/// a `::text` cast compares the text forms. Without a `.*` projection only
/// the selected columns come back.
#[derive(Default)]
pub struct MemoryExecutor {
    rows: Vec<Row>,
    calls: Mutex<Vec<(String, Vec<SqlValue>)>>,
    executed: AtomicUsize,
    fail_with: Option<DatabaseError>,
    cancel_on_first_call: Option<CancelSignal>,
}

impl MemoryExecutor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failing(error: DatabaseError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn cancelling(mut self, cancel: CancelSignal) -> Self {
        self.cancel_on_first_call = Some(cancel);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[SqlValue],
    ) -> Result<Vec<Row>, DatabaseError> {
        let previous = self.executed.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            if let Some(cancel) = &self.cancel_on_first_call {
                cancel.cancel();
            }
        }
        self.calls
            .lock()
            .expect("calls lock")
            .push((statement.to_string(), parameters.to_vec()));

        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }

        let conditions = conditions(statement);
        let matches = |row: &Row| {
            conditions.iter().all(|(column, as_text, index)| {
                let Some(parameter) = parameters.get(index - 1) else {
                    return false;
                };
                let Some(value) = row.get(column) else {
                    return false;
                };
                if *as_text {
                    value.as_text() == parameter.as_text()
                } else if let SqlValue::Date(date) = parameter {
                    value.as_date() == Some(*date)
                } else {
                    value == parameter
                }
            })
        };
        let selected = selected_columns(statement);
        Ok(self
            .rows
            .iter()
            .filter(|row| matches(row))
            .map(|row| match &selected {
                Some(columns) => columns
                    .iter()
                    .filter_map(|column| row.get(column).map(|value| (column.clone(), value.clone())))
                    .collect::<Row>(),
                None => row.clone(),
            })
            .collect())
    }
}

fn selected_columns(statement: &str) -> Option<Vec<String>> {
    let projection = statement.strip_prefix("SELECT\n")?.split("\nFROM").next()?;
    let re = Regex::new(r#"^"\w+"\."(\w+)"(?: AS "(\w+)")?$"#).expect("projection regex");
    let mut columns = Vec::new();
    for part in projection.split(",\n") {
        let part = part.trim();
        if part.ends_with(".*") {
            return None;
        }
        let caps = re.captures(part)?;
        let name = caps.get(2).map_or(&caps[1], |label| label.as_str());
        columns.push(name.to_string());
    }
    Some(columns)
}

fn conditions(statement: &str) -> Vec<(String, bool, usize)> {
    let re = Regex::new(r#""(\w+)"(::text)? = \$(\d+)"#).expect("condition regex");
    re.captures_iter(statement)
        .map(|caps| {
            (
                caps[1].to_string(),
                caps.get(2).is_some(),
                caps[3].parse().expect("placeholder index"),
            )
        })
        .collect()
}

/// Factory handing out executors over the same rows; optionally refuses
/// every connection.
pub struct MemoryFactory {
    pub rows: Vec<Row>,
    pub refuse: bool,
}

#[async_trait]
impl ExecutorFactory for MemoryFactory {
    type Executor = MemoryExecutor;

    async fn connect(&self) -> Result<MemoryExecutor, DatabaseError> {
        if self.refuse {
            return Err(DatabaseError::new("08006", "connection refused"));
        }
        Ok(MemoryExecutor::new(self.rows.clone()))
    }
}
