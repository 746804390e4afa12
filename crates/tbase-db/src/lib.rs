//! Statement execution against the backing database.

pub mod executor;
pub mod postgres;

pub use executor::{Executor, ExecutorFactory};
pub use postgres::catalog::{
    discover_key_tables, list_columns, list_tables, load_catalog, KeyTable, TableSummary,
    DEFAULT_KEY_PATTERN,
};
pub use postgres::{PgExecutor, PgExecutorFactory};
