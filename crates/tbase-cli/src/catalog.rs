use tbase_db::{discover_key_tables, list_columns, list_tables, PgExecutor};

use crate::registry::write_results;
use crate::settings::load_match_config;
use crate::{begin_run, CliError, ColumnsArgs, DiscoverArgs, ListTablesArgs};

pub async fn run_list_tables(args: ListTablesArgs) -> Result<(), CliError> {
    let config = load_match_config(args.conn.config.as_deref())?;
    let run = begin_run("list-tables", &args.conn, serde_json::to_value(&args)?, &config, None)?;
    run.execute(async {
        let executor = PgExecutor::connect(&run.conn, 1).await?;
        let tables = list_tables(executor.pool(), args.schema.as_deref()).await?;
        tracing::info!(event = "tables_listed", tables = tables.len());

        write_results(&run.paths, &tables)?;
        println!("{}", serde_json::to_string_pretty(&tables)?);
        Ok::<(), CliError>(())
    })
    .await
}

pub async fn run_columns(args: ColumnsArgs) -> Result<(), CliError> {
    let config = load_match_config(args.conn.config.as_deref())?;
    let run = begin_run("columns", &args.conn, serde_json::to_value(&args)?, &config, None)?;
    run.execute(async {
        let executor = PgExecutor::connect(&run.conn, 1).await?;
        let columns = list_columns(executor.pool(), &args.schema, &args.table).await?;
        if columns.is_empty() {
            tracing::warn!(event = "table_not_found", schema = %args.schema, table = %args.table);
        }

        write_results(&run.paths, &columns)?;
        println!("{}", serde_json::to_string_pretty(&columns)?);
        Ok::<(), CliError>(())
    })
    .await
}

pub async fn run_discover(args: DiscoverArgs) -> Result<(), CliError> {
    let config = load_match_config(args.conn.config.as_deref())?;
    let run = begin_run("discover", &args.conn, serde_json::to_value(&args)?, &config, None)?;
    run.execute(async {
        let executor = PgExecutor::connect(&run.conn, 1).await?;
        let tables = discover_key_tables(executor.pool(), &args.schema, &args.key_pattern).await?;
        tracing::info!(event = "key_tables_discovered", tables = tables.len());

        write_results(&run.paths, &tables)?;
        println!("{}", serde_json::to_string_pretty(&tables)?);
        Ok::<(), CliError>(())
    })
    .await
}
