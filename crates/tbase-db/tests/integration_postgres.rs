use std::env;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tbase_core::SqlValue;
use tbase_db::{
    discover_key_tables, list_columns, list_tables, load_catalog, Executor, ExecutorFactory,
    PgExecutor, PgExecutorFactory, DEFAULT_KEY_PATTERN,
};

const SCHEMA: &str = "tbase_it";

// Every test recreates the fixture schema.
static FIXTURE_LOCK: Mutex<()> = Mutex::const_new(());

const FIXTURE: &[&str] = &[
    "drop schema if exists tbase_it cascade",
    "create schema tbase_it",
    r#"create table tbase_it."Patient" (
        "PatientID" int4 primary key,
        "Vorname" text not null,
        "Name" text not null,
        "Geburtsdatum" date not null,
        "Aufnahme" timestamptz
    )"#,
    r#"create table tbase_it."Diagnose" (
        "DiagnoseID" int4 primary key,
        "PatientID" int4 not null,
        "ICD10" varchar(10) not null,
        "Gewicht" float8
    )"#,
    r#"create table tbase_it."Station" ("StationID" int4 primary key, "Name" text)"#,
    r#"insert into tbase_it."Patient" values
        (1, 'John', 'Doe', '1980-05-17', '2024-01-02 08:00:00+00'),
        (2, 'Jane', 'Roe', '1975-11-02', null)"#,
    r#"insert into tbase_it."Diagnose" values (10, 1, 'E11.9', 81.5), (11, 1, 'I10', null)"#,
];

/// Returns `None` when no database is configured; these tests are skipped then.
fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

async fn prepare(url: &str) -> Result<PgExecutor> {
    let executor = PgExecutor::connect(url, 2)
        .await
        .context("connecting to Postgres")?;
    reset_fixture(executor.pool()).await?;
    Ok(executor)
}

async fn reset_fixture(pool: &PgPool) -> Result<()> {
    for statement in FIXTURE {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("executing fixture statement: {statement}"))?;
    }
    Ok(())
}

#[tokio::test]
async fn executes_bound_statements_and_decodes_types() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL");
        return Ok(());
    };
    let _guard = FIXTURE_LOCK.lock().await;
    let executor = prepare(&url).await?;

    let dob = NaiveDate::from_ymd_opt(1980, 5, 17).context("date")?;
    let rows = executor
        .execute(
            r#"SELECT "p".*, "d"."ICD10", "d"."Gewicht"
               FROM "tbase_it"."Patient" AS "p"
               LEFT JOIN "tbase_it"."Diagnose" AS "d" ON "p"."PatientID" = "d"."PatientID"
               WHERE "p"."Geburtsdatum" = $1
               ORDER BY "d"."ICD10" ASC"#,
            &[SqlValue::Date(dob)],
        )
        .await?;

    assert_eq!(rows.len(), 2);
    let first = &rows[0];
    assert_eq!(first.get("PatientID"), Some(&SqlValue::Integer(1)));
    assert_eq!(first.get("Vorname"), Some(&SqlValue::Text("John".to_string())));
    assert_eq!(first.get("Geburtsdatum"), Some(&SqlValue::Date(dob)));
    assert!(matches!(first.get("Aufnahme"), Some(SqlValue::DateTime(_))));
    assert_eq!(first.get("ICD10"), Some(&SqlValue::Text("E11.9".to_string())));
    assert_eq!(first.get("Gewicht"), Some(&SqlValue::Float(81.5)));
    assert_eq!(rows[1].get("Gewicht"), Some(&SqlValue::Null));
    Ok(())
}

#[tokio::test]
async fn hostile_values_are_data_not_sql() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL");
        return Ok(());
    };
    let _guard = FIXTURE_LOCK.lock().await;
    let executor = prepare(&url).await?;

    let rows = executor
        .execute(
            r#"SELECT "p".* FROM "tbase_it"."Patient" AS "p" WHERE "p"."Name" = $1"#,
            &[SqlValue::Text("x'; DROP TABLE tbase_it.\"Patient\"; --".to_string())],
        )
        .await?;
    assert!(rows.is_empty());

    let still_there = executor
        .execute(r#"SELECT count(*) AS n FROM "tbase_it"."Patient""#, &[])
        .await?;
    assert_eq!(still_there[0].get("n"), Some(&SqlValue::Integer(2)));
    Ok(())
}

#[tokio::test]
async fn database_errors_do_not_echo_parameters() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL");
        return Ok(());
    };
    let _guard = FIXTURE_LOCK.lock().await;
    let executor = prepare(&url).await?;

    let err = executor
        .execute(
            r#"SELECT "p".* FROM "tbase_it"."Patient" AS "p" WHERE "p"."PatientID" = $1::int4"#,
            &[SqlValue::Text("not-a-number".to_string())],
        )
        .await
        .expect_err("invalid integer input");
    assert_eq!(err.sql_state, "22P02");
    assert!(!err.message.contains("not-a-number"));
    Ok(())
}

#[tokio::test]
async fn browses_catalog_with_bound_parameters() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL");
        return Ok(());
    };
    let _guard = FIXTURE_LOCK.lock().await;
    let executor = prepare(&url).await?;
    let pool = executor.pool();

    let tables = list_tables(pool, Some(SCHEMA)).await?;
    let names: Vec<&str> = tables.iter().map(|table| table.name.as_str()).collect();
    assert_eq!(names, vec!["Diagnose", "Patient", "Station"]);
    assert_eq!(tables[1].column_count, 5);

    let columns = list_columns(pool, SCHEMA, "Patient").await?;
    assert_eq!(columns[0].name, "PatientID");
    assert_eq!(columns[0].ordinal_position, 1);
    assert!(!columns[0].is_nullable);
    assert!(columns[4].is_nullable);

    let key_tables = discover_key_tables(pool, SCHEMA, DEFAULT_KEY_PATTERN).await?;
    let names: Vec<&str> = key_tables.iter().map(|table| table.name.as_str()).collect();
    assert_eq!(names, vec!["Diagnose", "Patient"]);
    assert!(key_tables.iter().all(|table| table.key_column == "PatientID"));

    let catalog = load_catalog(pool, SCHEMA).await?;
    assert_eq!(catalog.len(), 3);
    let patient = catalog.table(SCHEMA, "Patient").context("patient table")?;
    assert!(patient.has_column("Geburtsdatum"));
    Ok(())
}

#[tokio::test]
async fn factory_opens_independent_executors() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL");
        return Ok(());
    };
    let _guard = FIXTURE_LOCK.lock().await;
    prepare(&url).await?;

    let factory = PgExecutorFactory::new(url);
    let first = factory.connect().await?;
    let second = factory.connect().await?;
    let (a, b) = tokio::join!(
        first.execute("SELECT 1::int8 AS one", &[]),
        second.execute("SELECT 2::int8 AS two", &[]),
    );
    assert_eq!(a?[0].get("one"), Some(&SqlValue::Integer(1)));
    assert_eq!(b?[0].get("two"), Some(&SqlValue::Integer(2)));
    Ok(())
}
