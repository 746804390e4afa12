use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use tbase_core::{DatabaseError, Row, SqlValue};

use crate::executor::{Executor, ExecutorFactory};

pub mod catalog;
mod decode;
mod queries;

pub use decode::map_sqlx_error;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Executor backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Create an executor over a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool with at most `max_connections` sessions.
    pub async fn connect(conn: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(conn)
            .await
            .map_err(|err| map_sqlx_error(&err, &[]))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for PgExecutor {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[SqlValue],
    ) -> Result<Vec<Row>, DatabaseError> {
        let query = decode::bind_parameters(sqlx::query(statement), parameters);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| map_sqlx_error(&err, parameters))?;
        Ok(rows.iter().map(decode::decode_row).collect())
    }
}

/// Opens a dedicated single-connection executor for each batch worker.
#[derive(Debug, Clone)]
pub struct PgExecutorFactory {
    conn: String,
}

impl PgExecutorFactory {
    pub fn new(conn: impl Into<String>) -> Self {
        Self { conn: conn.into() }
    }
}

#[async_trait]
impl ExecutorFactory for PgExecutorFactory {
    type Executor = PgExecutor;

    async fn connect(&self) -> Result<PgExecutor, DatabaseError> {
        PgExecutor::connect(&self.conn, 1).await
    }
}
