pub mod input;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::Instrument;

use tbase_core::SearchCriteria;
use tbase_db::{Executor, ExecutorFactory};
use tbase_plan::QueryPlan;

use crate::config::MatchConfig;
use crate::engine::resolve;
use crate::errors::{InvalidRowError, ResolveError};
use crate::model::{BatchOutcome, BatchResult, BatchRow, ErrorKind};

/// Cooperative cancellation flag shared by a batch and its caller.
///
/// Checked before each row starts; a row already running completes.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Resolve every row in order on one executor.
///
/// Per-row failures become `Failed` outcomes; the batch itself never fails.
pub async fn run_batch<B, E>(
    rows: Vec<BatchRow>,
    builder: &B,
    template: &QueryPlan,
    config: &MatchConfig,
    executor: &E,
    cancel: &CancelSignal,
) -> BatchResult
where
    B: Fn(&BatchRow) -> Result<SearchCriteria, InvalidRowError> + ?Sized,
    E: Executor + ?Sized,
{
    let started = Instant::now();
    let total = rows.len();
    tracing::info!(event = "batch_started", rows = total, workers = 1);

    let mut outcomes = Vec::with_capacity(total);
    for row in rows {
        let outcome = if cancel.is_cancelled() {
            BatchOutcome::cancelled()
        } else {
            resolve_row(&row, builder, template, config, executor).await
        };
        outcomes.push((row, outcome));
    }

    let result = BatchResult::finalize(outcomes);
    log_finished(&result, started);
    result
}

/// Resolve rows on `workers` tasks, each with its own executor.
///
/// Rows are dealt to workers round-robin. When a worker cannot connect, the
/// rows dealt to it fail as `Database`. Outcomes keep input order.
pub async fn run_batch_concurrent<B, F>(
    rows: Vec<BatchRow>,
    builder: Arc<B>,
    template: Arc<QueryPlan>,
    config: Arc<MatchConfig>,
    factory: Arc<F>,
    workers: usize,
    cancel: CancelSignal,
) -> BatchResult
where
    B: Fn(&BatchRow) -> Result<SearchCriteria, InvalidRowError> + Send + Sync + 'static,
    F: ExecutorFactory + 'static,
{
    let started = Instant::now();
    let total = rows.len();
    let workers = workers.clamp(1, total.max(1));
    tracing::info!(event = "batch_started", rows = total, workers = workers);

    let mut shares: Vec<Vec<(usize, BatchRow)>> = vec![Vec::new(); workers];
    for (position, row) in rows.into_iter().enumerate() {
        shares[position % workers].push((position, row));
    }

    let mut handles = Vec::with_capacity(workers);
    for (worker, share) in shares.into_iter().enumerate() {
        let reserve = share.clone();
        let builder = Arc::clone(&builder);
        let template = Arc::clone(&template);
        let config = Arc::clone(&config);
        let factory = Arc::clone(&factory);
        let cancel = cancel.clone();
        let work = async move {
            let executor = match factory.connect().await {
                Ok(executor) => executor,
                Err(err) => {
                    tracing::warn!(
                        event = "worker_connect_failed",
                        worker = worker,
                        sql_state = %err.sql_state,
                        rows = share.len(),
                    );
                    let detail = err.detail();
                    return share
                        .into_iter()
                        .map(|(position, row)| {
                            let outcome = BatchOutcome::failed(ErrorKind::Database, detail.clone());
                            (position, row, outcome)
                        })
                        .collect::<Vec<_>>();
                }
            };

            let mut resolved = Vec::with_capacity(share.len());
            for (position, row) in share {
                let outcome = if cancel.is_cancelled() {
                    BatchOutcome::cancelled()
                } else {
                    resolve_row(&row, builder.as_ref(), &template, &config, &executor).await
                };
                resolved.push((position, row, outcome));
            }
            resolved
        };
        // Workers log under the caller's span.
        let handle = tokio::spawn(work.in_current_span());
        handles.push((reserve, handle));
    }

    let mut collected = Vec::with_capacity(total);
    for (reserve, handle) in handles {
        match handle.await {
            Ok(resolved) => collected.extend(resolved),
            Err(err) => {
                tracing::error!(event = "worker_failed", error = %err);
                let detail = format!("worker task failed: {err}");
                collected.extend(reserve.into_iter().map(|(position, row)| {
                    (position, row, BatchOutcome::failed(ErrorKind::Database, detail.clone()))
                }));
            }
        }
    }
    collected.sort_by_key(|(position, _, _)| *position);

    let result = BatchResult::finalize(
        collected
            .into_iter()
            .map(|(_, row, outcome)| (row, outcome))
            .collect(),
    );
    log_finished(&result, started);
    result
}

async fn resolve_row<B, E>(
    row: &BatchRow,
    builder: &B,
    template: &QueryPlan,
    config: &MatchConfig,
    executor: &E,
) -> BatchOutcome
where
    B: Fn(&BatchRow) -> Result<SearchCriteria, InvalidRowError> + ?Sized,
    E: Executor + ?Sized,
{
    let criteria = match builder(row) {
        Ok(criteria) => criteria,
        Err(err) => {
            tracing::warn!(event = "batch_row_invalid", row_index = row.row_index, error = %err);
            return BatchOutcome::failed(ErrorKind::InvalidRow, err.to_string());
        }
    };

    let outcome = match resolve(&criteria, template, config, executor).await {
        Ok(candidates) => BatchOutcome::Succeeded { candidates },
        Err(ResolveError::Database(err)) => BatchOutcome::failed(ErrorKind::Database, err.detail()),
        Err(err @ ResolveError::Query(_)) => {
            BatchOutcome::failed(ErrorKind::InvalidPlan, err.to_string())
        }
    };
    tracing::debug!(
        event = "batch_row_finished",
        row_index = row.row_index,
        status = outcome.status(),
    );
    outcome
}

fn log_finished(result: &BatchResult, started: Instant) {
    tracing::info!(
        event = "batch_finished",
        rows = result.len(),
        succeeded = result.success_count,
        failed = result.failure_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
    );
}
