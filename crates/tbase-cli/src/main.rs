mod catalog;
mod registry;
mod settings;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, Span};
use uuid::Uuid;

use tbase_core::{
    describe_parameters, redact_connection_string, Catalog, CriteriaError, DatabaseError,
    DemographicCriteria, KeyValue, SearchCriteria, DOB_FORMAT,
};
use tbase_db::{load_catalog, PgExecutor, PgExecutorFactory};
use tbase_match::{
    demographic_builder, exact_key_builder, fallback_builder, read_batch_file, resolve,
    resolve_exact_demographic, run_batch, run_batch_concurrent, BatchInputError, BatchMode,
    BatchResult, CancelSignal, ConfigError, MatchConfig, ResolveError,
};
use tbase_plan::{
    build_query, check_plan_against_catalog, key_column_is_text, parse_table_specs,
    validate_plan, JoinType, MalformedOrderError, MalformedSpecError, OrderBy, Predicate,
    QueryError, QueryPlan, UnsupportedJoinError, ValidationError,
};

use registry::{init_run_logging, start_run, write_results, write_row_outcome, RunContext, RunPaths};
use settings::{load_match_config, SettingsError};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Spec(#[from] MalformedSpecError),
    #[error("invalid plan: {0}")]
    Plan(#[from] ValidationError),
    #[error(transparent)]
    Join(#[from] UnsupportedJoinError),
    #[error(transparent)]
    Order(#[from] MalformedOrderError),
    #[error("invalid criteria: {0}")]
    Criteria(#[from] CriteriaError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("batch input error: {0}")]
    BatchInput(#[from] BatchInputError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "tbase", version, about = "Patient lookup across related tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up one patient by key.
    Query(QueryArgs),
    /// Search by first name, last name and date of birth.
    Search(SearchArgs),
    /// Resolve every row of a CSV file.
    Batch(BatchArgs),
    /// Print the assembled statement without connecting.
    Plan(PlanArgs),
    /// List base tables.
    ListTables(ListTablesArgs),
    /// List the columns of one table.
    Columns(ColumnsArgs),
    /// Find tables carrying a patient key column.
    Discover(DiscoverArgs),
}

#[derive(Args, Debug, Serialize)]
struct ConnArgs {
    /// Database connection string; falls back to DATABASE_URL.
    #[arg(long, value_name = "CONNECTION_STRING")]
    #[serde(skip)]
    conn: Option<String>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// TOML file with match settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Serialize)]
struct TableArgs {
    /// Table spec `schema.table[:alias][[cols]][@joinColumn]`; the first is the anchor.
    #[arg(long = "table", value_name = "SPEC", required = true)]
    tables: Vec<String>,
    /// INNER, LEFT, RIGHT or FULL; overrides the config file.
    #[arg(long)]
    join_type: Option<String>,
    /// Sort key `alias.column[:asc|:desc]`.
    #[arg(long, value_name = "ALIAS.COLUMN")]
    order_by: Vec<String>,
    #[arg(long)]
    limit: Option<u32>,
    /// Check tables and columns against the database catalog first.
    #[arg(long, default_value_t = false)]
    check_catalog: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(flatten)]
    tables: TableArgs,
    /// Patient key value.
    #[arg(long)]
    key: String,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(flatten)]
    tables: TableArgs,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    /// Date of birth as YYYY-MM-DD.
    #[arg(long)]
    dob: String,
    /// Minimum composite score in [0, 1].
    #[arg(long, conflicts_with = "exact")]
    threshold: Option<f64>,
    /// Require exact equality on all three fields instead of scoring names.
    #[arg(long, default_value_t = false)]
    exact: bool,
}

#[derive(Args, Debug, Serialize)]
struct BatchArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(flatten)]
    tables: TableArgs,
    /// CSV file with a header line.
    #[arg(long)]
    input: PathBuf,
    #[arg(long, value_enum)]
    mode: ModeArg,
    /// Concurrent workers, each with its own connection.
    #[arg(long, default_value_t = 1)]
    workers: usize,
    /// Write one row_<index>.json per input row.
    #[arg(long, default_value_t = false)]
    split: bool,
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
enum ModeArg {
    Key,
    Demographic,
    /// Key where the row has one, demographics otherwise.
    Auto,
}

impl From<ModeArg> for BatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Key => BatchMode::Key,
            ModeArg::Demographic => BatchMode::Demographic,
            ModeArg::Auto => BatchMode::Auto,
        }
    }
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    tables: TableArgs,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Filter by this key instead of selecting every row.
    #[arg(long)]
    key: Option<String>,
}

#[derive(Args, Debug, Serialize)]
struct ListTablesArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[arg(long)]
    schema: Option<String>,
}

#[derive(Args, Debug, Serialize)]
struct ColumnsArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[arg(long)]
    schema: String,
    #[arg(long)]
    table: String,
}

#[derive(Args, Debug, Serialize)]
struct DiscoverArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[arg(long)]
    schema: String,
    /// ILIKE pattern for key column names.
    #[arg(long, default_value = tbase_db::DEFAULT_KEY_PATTERN)]
    key_pattern: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Query(args) => run_query(args).await,
        Command::Search(args) => run_search(args).await,
        Command::Batch(args) => run_batch_command(args).await,
        Command::Plan(args) => run_plan(args),
        Command::ListTables(args) => catalog::run_list_tables(args).await,
        Command::Columns(args) => catalog::run_columns(args).await,
        Command::Discover(args) => catalog::run_discover(args).await,
    }
}

/// Started run: artifacts directory, log span and the connection to use.
struct Run {
    conn: String,
    paths: RunPaths,
    span: Span,
    started: Instant,
}

impl Run {
    /// Drive `work` inside the run span and log how it ended.
    async fn execute<T, F>(&self, work: F) -> Result<T, CliError>
    where
        F: Future<Output = Result<T, CliError>>,
    {
        let result = work.instrument(self.span.clone()).await;
        let duration_ms = self.started.elapsed().as_millis() as u64;
        self.span.in_scope(|| match &result {
            Ok(_) => tracing::info!(event = "run_finished", status = "success", duration_ms),
            Err(err) => tracing::error!(
                event = "run_finished",
                status = "failed",
                error = %err,
                duration_ms,
            ),
        });
        eprintln!("run artifacts: {}", self.paths.root.display());
        result
    }
}

fn begin_run(
    command: &str,
    conn: &ConnArgs,
    options: serde_json::Value,
    match_config: &MatchConfig,
    plan: Option<String>,
) -> Result<Run, CliError> {
    let conn_string = resolve_conn(conn.conn.as_deref())?;
    let engine = detect_engine(&conn_string)?;

    let ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: chrono::Utc::now(),
        command: command.to_string(),
        run_dir: conn.run_dir.clone(),
        connection: redact_connection_string(&conn_string),
        options,
        match_config: match_config.clone(),
        plan,
    };

    let paths = start_run(&ctx)?;
    let span = init_run_logging(&ctx, &paths)?;
    span.in_scope(|| tracing::info!(event = "run_started", engine = engine));

    Ok(Run {
        conn: conn_string,
        paths,
        span,
        started: Instant::now(),
    })
}

fn resolve_conn(flag: Option<&str>) -> Result<String, CliError> {
    match flag {
        Some(value) => Ok(value.to_string()),
        None => std::env::var("DATABASE_URL").map_err(|_| {
            CliError::InvalidArgument(
                "connection string is required (--conn or DATABASE_URL)".to_string(),
            )
        }),
    }
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(
            redact_connection_string(conn).redacted,
        ))
    }
}

/// Load the config file and apply flag overrides.
fn match_config(path: Option<&Path>, tables: &TableArgs) -> Result<MatchConfig, CliError> {
    let mut config = load_match_config(path)?;
    if let Some(join_type) = &tables.join_type {
        config.join_type = join_type.parse::<JoinType>()?;
    }
    Ok(config)
}

fn build_template(tables: &TableArgs, config: &MatchConfig) -> Result<QueryPlan, CliError> {
    let specs = parse_table_specs(&tables.tables, &config.key_column)?;
    let mut options = config.plan_options();
    options.order_by = tables
        .order_by
        .iter()
        .map(|text| text.parse::<OrderBy>())
        .collect::<Result<_, _>>()?;
    options.limit = tables.limit;
    Ok(validate_plan(specs, &options)?)
}

/// Check `plan` against the live catalog. Returns the plan to run, comparing
/// keys as text when the anchor key column holds character data.
async fn check_catalog(executor: &PgExecutor, plan: QueryPlan) -> Result<QueryPlan, CliError> {
    let mut schemas: Vec<&str> = plan.tables.iter().map(|spec| spec.schema.as_str()).collect();
    schemas.sort_unstable();
    schemas.dedup();

    let mut tables = Vec::new();
    for schema in schemas {
        let catalog = load_catalog(executor.pool(), schema).await?;
        tables.extend(catalog.tables().cloned());
    }
    let catalog = Catalog::new(tables);
    check_plan_against_catalog(&plan, &catalog)?;

    let text_keys = plan.text_keys || key_column_is_text(&plan, &catalog);
    tracing::info!(event = "catalog_checked", tables = plan.tables.len(), text_keys);
    Ok(plan.with_text_keys(text_keys))
}

fn parse_dob(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw.trim(), DOB_FORMAT)
        .map_err(|_| CliError::InvalidArgument(format!("--dob must use {DOB_FORMAT}")))
}

async fn run_query(args: QueryArgs) -> Result<(), CliError> {
    let config = match_config(args.conn.config.as_deref(), &args.tables)?;
    let template = build_template(&args.tables, &config)?;
    let criteria = SearchCriteria::exact_key(KeyValue::parse(&args.key)?);
    let statement = build_query(&template.with_criteria(Predicate::from(&criteria)))?;

    let run = begin_run(
        "query",
        &args.conn,
        serde_json::to_value(&args.tables)?,
        &config,
        Some(statement.text),
    )?;
    run.execute(async {
        let executor = PgExecutor::connect(&run.conn, 1).await?;
        let template = if args.tables.check_catalog {
            check_catalog(&executor, template).await?
        } else {
            template
        };

        let candidates = resolve(&criteria, &template, &config, &executor).await?;
        write_results(&run.paths, &candidates)?;
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        Ok::<(), CliError>(())
    })
    .await
}

async fn run_search(args: SearchArgs) -> Result<(), CliError> {
    let config = match_config(args.conn.config.as_deref(), &args.tables)?;
    let template = build_template(&args.tables, &config)?;
    let criteria = DemographicCriteria::new(
        args.first_name.as_str(),
        args.last_name.as_str(),
        parse_dob(&args.dob)?,
        args.threshold.unwrap_or(config.threshold),
    )?;

    let mut options = serde_json::to_value(&args.tables)?;
    options["threshold"] = serde_json::json!(args.threshold);
    options["exact"] = serde_json::json!(args.exact);
    let run = begin_run("search", &args.conn, options, &config, None)?;
    run.execute(async {
        let executor = PgExecutor::connect(&run.conn, 1).await?;
        let template = if args.tables.check_catalog {
            check_catalog(&executor, template).await?
        } else {
            template
        };

        let candidates = if args.exact {
            resolve_exact_demographic(&criteria, &template, &executor).await?
        } else {
            let criteria = SearchCriteria::Demographic(criteria.clone());
            resolve(&criteria, &template, &config, &executor).await?
        };
        write_results(&run.paths, &candidates)?;
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        Ok::<(), CliError>(())
    })
    .await
}

async fn run_batch_command(args: BatchArgs) -> Result<(), CliError> {
    let config = match_config(args.conn.config.as_deref(), &args.tables)?;
    let threshold = args.threshold.unwrap_or(config.threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CliError::InvalidArgument(format!(
            "--threshold {threshold} is outside [0, 1]"
        )));
    }
    if args.workers == 0 {
        return Err(CliError::InvalidArgument("--workers must be at least 1".to_string()));
    }

    let template = build_template(&args.tables, &config)?;
    let mode = BatchMode::from(args.mode);
    let rows = read_batch_file(&args.input, &mode.required_columns(&config.csv_columns))?;

    let run = begin_run("batch", &args.conn, serde_json::to_value(&args)?, &config, None)?;
    run.execute(async {
        tracing::info!(event = "batch_input_read", rows = rows.len(), mode = ?mode);

        let cancel = CancelSignal::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!(event = "batch_interrupted");
                    on_interrupt.cancel();
                }
            }
            .in_current_span(),
        );

        let template = if args.tables.check_catalog {
            let executor = PgExecutor::connect(&run.conn, 1).await?;
            check_catalog(&executor, template).await?
        } else {
            template
        };

        let columns = config.csv_columns.clone();
        let workers = args.workers;
        let result = match mode {
            BatchMode::Key => {
                let builder = exact_key_builder(columns.key);
                execute_batch(rows, builder, template, config, &run.conn, workers, cancel).await?
            }
            BatchMode::Demographic => {
                let builder = demographic_builder(columns, threshold);
                execute_batch(rows, builder, template, config, &run.conn, workers, cancel).await?
            }
            BatchMode::Auto => {
                let builder = fallback_builder(columns, threshold);
                execute_batch(rows, builder, template, config, &run.conn, workers, cancel).await?
            }
        };

        write_results(&run.paths, &result)?;
        if args.split {
            for (row, outcome) in &result.outcomes {
                write_row_outcome(
                    &run.paths,
                    row.row_index,
                    &serde_json::json!({ "row": row, "outcome": outcome }),
                )?;
            }
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "rows": result.len(),
                "success_count": result.success_count,
                "failure_count": result.failure_count,
            }))?
        );
        Ok::<(), CliError>(())
    })
    .await
}

async fn execute_batch<B>(
    rows: Vec<tbase_match::BatchRow>,
    builder: B,
    template: QueryPlan,
    config: MatchConfig,
    conn: &str,
    workers: usize,
    cancel: CancelSignal,
) -> Result<BatchResult, CliError>
where
    B: Fn(&tbase_match::BatchRow) -> Result<SearchCriteria, tbase_match::InvalidRowError>
        + Send
        + Sync
        + 'static,
{
    if workers <= 1 {
        let executor = PgExecutor::connect(conn, 1).await?;
        return Ok(run_batch(rows, &builder, &template, &config, &executor, &cancel).await);
    }

    let factory = PgExecutorFactory::new(conn);
    Ok(run_batch_concurrent(
        rows,
        Arc::new(builder),
        Arc::new(template),
        Arc::new(config),
        Arc::new(factory),
        workers,
        cancel,
    )
    .await)
}

fn run_plan(args: PlanArgs) -> Result<(), CliError> {
    let config = match_config(args.config.as_deref(), &args.tables)?;
    let template = build_template(&args.tables, &config)?;
    let criteria = match &args.key {
        Some(key) => Predicate::KeyEquals(KeyValue::parse(key)?),
        None => Predicate::All,
    };
    let statement = build_query(&template.with_criteria(criteria))?;

    println!("{}", statement.text);
    println!(
        "-- {} parameter(s): {}",
        statement.parameters.len(),
        describe_parameters(&statement.parameters)
    );
    Ok(())
}
