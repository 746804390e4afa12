//! Per-run directories and the artifacts written into them.

mod logs;
mod run;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use logs::init_run_logging;
pub use run::{start_run, write_results, write_row_outcome, RunContext, RunPaths};

/// Failure to record a run artifact; every variant names the file involved.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot create run directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("run {run_id}: a log subscriber is already installed")]
    LoggerInstalled { run_id: String },
}

impl RegistryError {
    pub(crate) fn write(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| RegistryError::Write { path, source }
    }
}
