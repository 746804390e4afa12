use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef};

use tbase_core::{scrub_parameters, DatabaseError, Row, SqlValue};

pub(crate) fn bind_parameters<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    parameters: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in parameters {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(value) => query.bind(*value),
            SqlValue::Integer(value) => query.bind(*value),
            SqlValue::Float(value) => query.bind(*value),
            SqlValue::Date(value) => query.bind(*value),
            SqlValue::DateTime(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.clone()),
        };
    }
    query
}

pub(crate) fn decode_row(row: &PgRow) -> Row {
    let mut decoded = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_info().name(), column.name());
        decoded.push(column.name(), value);
    }
    decoded
}

fn decode_value(row: &PgRow, idx: usize, type_name: &str, column: &str) -> SqlValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(_) => {}
        Err(_) => return SqlValue::Null,
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(idx).map(SqlValue::Bool),
        "INT2" => row
            .try_get::<i16, _>(idx)
            .map(|value| SqlValue::Integer(value.into())),
        "INT4" => row
            .try_get::<i32, _>(idx)
            .map(|value| SqlValue::Integer(value.into())),
        "INT8" => row.try_get::<i64, _>(idx).map(SqlValue::Integer),
        "FLOAT4" => row
            .try_get::<f32, _>(idx)
            .map(|value| SqlValue::Float(value.into())),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(SqlValue::Float),
        "DATE" => row.try_get::<NaiveDate, _>(idx).map(SqlValue::Date),
        "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(idx).map(SqlValue::DateTime),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|value| SqlValue::DateTime(value.naive_utc())),
        _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
    };

    decoded.unwrap_or_else(|err| {
        tracing::warn!(
            event = "column_decode_failed",
            column = column,
            type_name = type_name,
            error = %err,
            "column value replaced with null"
        );
        SqlValue::Null
    })
}

/// Convert a driver error, removing any rendering of the bound values.
pub fn map_sqlx_error(err: &sqlx::Error, parameters: &[SqlValue]) -> DatabaseError {
    let (sql_state, message) = match err {
        sqlx::Error::Database(db) => (
            db.code()
                .map(|code| code.into_owned())
                .unwrap_or_else(|| "XX000".to_string()),
            db.message().to_string(),
        ),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => ("08006".to_string(), err.to_string()),
        sqlx::Error::Configuration(_) => ("08001".to_string(), err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            ("22000".to_string(), err.to_string())
        }
        _ => ("HY000".to_string(), err.to_string()),
    };
    DatabaseError::new(sql_state, scrub_parameters(&message, parameters))
}
