use std::sync::Arc;

use async_trait::async_trait;

use tbase_core::{DatabaseError, Row, SqlValue};

/// Runs a parameterized statement and returns its rows.
///
/// `parameters` bind to `$1..$n` in order. Implementations must not place
/// parameter values into the text of a returned [`DatabaseError`].
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[SqlValue],
    ) -> Result<Vec<Row>, DatabaseError>;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[SqlValue],
    ) -> Result<Vec<Row>, DatabaseError> {
        (**self).execute(statement, parameters).await
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for &E {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[SqlValue],
    ) -> Result<Vec<Row>, DatabaseError> {
        (**self).execute(statement, parameters).await
    }
}

/// Opens one executor per concurrent batch worker.
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    type Executor: Executor + 'static;

    async fn connect(&self) -> Result<Self::Executor, DatabaseError>;
}
