use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::Span;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use super::{RegistryError, RunContext, RunPaths};

/// Append JSON log lines to the run's `logs.ndjson`.
///
/// Returns the run span; every event recorded inside it carries the run id
/// and subcommand. The level comes from `RUST_LOG` and defaults to `info`.
pub fn init_run_logging(ctx: &RunContext, paths: &RunPaths) -> Result<Span, RegistryError> {
    let file = OpenOptions::new()
        .append(true)
        .open(&paths.logs_path)
        .map_err(RegistryError::write(&paths.logs_path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|_| RegistryError::LoggerInstalled {
            run_id: ctx.run_id.clone(),
        })?;

    Ok(tracing::info_span!(
        "run",
        run_id = %ctx.run_id,
        command = %ctx.command
    ))
}
