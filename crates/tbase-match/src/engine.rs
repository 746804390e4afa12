use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Instant;

use tbase_core::{describe_parameters, DemographicCriteria, Row, SearchCriteria, SqlValue};
use tbase_db::Executor;
use tbase_plan::{build_query, Predicate, QueryPlan};

use crate::config::MatchConfig;
use crate::errors::ResolveError;
use crate::model::MatchCandidate;
use crate::similarity::{composite_score, name_similarity};

/// Resolve one set of criteria against `template`.
///
/// The template's own criteria are replaced. Exact-key lookups return every
/// row with score `1.0`; demographic lookups return rows with the same date
/// of birth whose composite name score reaches the criteria threshold,
/// best first. An empty vector means no match.
pub async fn resolve<E>(
    criteria: &SearchCriteria,
    template: &QueryPlan,
    config: &MatchConfig,
    executor: &E,
) -> Result<Vec<MatchCandidate>, ResolveError>
where
    E: Executor + ?Sized,
{
    let started = Instant::now();
    let strategy = criteria.kind();

    let candidates = match criteria {
        SearchCriteria::ExactKey { .. } => {
            let plan = template.with_criteria(Predicate::from(criteria));
            let rows = fetch(&plan, executor, strategy).await?;
            let key_column = plan.key_column().unwrap_or_default().to_string();
            rows.into_iter()
                .map(|row| MatchCandidate {
                    row,
                    score: 1.0,
                    matched_fields: BTreeSet::from([key_column.clone()]),
                })
                .collect()
        }
        SearchCriteria::Demographic(demographic) => {
            resolve_demographic(demographic, template, config, executor, strategy).await?
        }
    };

    tracing::info!(
        event = "resolve_finished",
        strategy = strategy,
        candidates = candidates.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
    );
    Ok(candidates)
}

/// Look up rows whose first name, last name and date of birth all equal the
/// criteria exactly, in one statement. Every row scores `1.0`; the threshold
/// is not consulted.
pub async fn resolve_exact_demographic<E>(
    criteria: &DemographicCriteria,
    template: &QueryPlan,
    executor: &E,
) -> Result<Vec<MatchCandidate>, ResolveError>
where
    E: Executor + ?Sized,
{
    let started = Instant::now();
    let strategy = "exact_demographic";
    let plan = template.with_criteria(Predicate::from(criteria));
    let rows = fetch(&plan, executor, strategy).await?;

    let columns = &template.demographic_columns;
    let matched_fields = BTreeSet::from([
        columns.first_name.clone(),
        columns.last_name.clone(),
        columns.date_of_birth.clone(),
    ]);
    let key_column = template.key_column().unwrap_or_default();
    let mut candidates: Vec<MatchCandidate> = rows
        .into_iter()
        .map(|row| MatchCandidate {
            row,
            score: 1.0,
            matched_fields: matched_fields.clone(),
        })
        .collect();
    candidates.sort_by(|left, right| compare_keys(&left.row, &right.row, key_column));

    tracing::info!(
        event = "resolve_finished",
        strategy = strategy,
        candidates = candidates.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
    );
    Ok(candidates)
}

async fn resolve_demographic<E>(
    criteria: &DemographicCriteria,
    template: &QueryPlan,
    config: &MatchConfig,
    executor: &E,
    strategy: &'static str,
) -> Result<Vec<MatchCandidate>, ResolveError>
where
    E: Executor + ?Sized,
{
    let columns = &template.demographic_columns;
    let dob = criteria.date_of_birth();

    let rows = if config.prefilter_date_of_birth {
        let plan = template.with_criteria(Predicate::date_of_birth(dob));
        fetch(&plan, executor, strategy).await?
    } else {
        let limit = match template.limit {
            Some(limit) => limit.min(config.candidate_limit),
            None => config.candidate_limit,
        };
        let plan = template
            .with_criteria(Predicate::demographic_scan())
            .with_limit(Some(limit));
        let mut rows = fetch(&plan, executor, strategy).await?;
        rows.retain(|row| {
            row.get(&columns.date_of_birth)
                .and_then(SqlValue::as_date)
                .is_some_and(|date| date == dob)
        });
        rows
    };
    let fetched = rows.len();

    let key_column = template.key_column().unwrap_or_default();
    let mut candidates: Vec<MatchCandidate> = rows
        .into_iter()
        .filter_map(|row| {
            let first = field_similarity(&row, &columns.first_name, criteria.first_name());
            let last = field_similarity(&row, &columns.last_name, criteria.last_name());
            let score = composite_score(first, last, &config.weights);
            if score < criteria.threshold() {
                return None;
            }

            let mut matched_fields = BTreeSet::from([columns.date_of_birth.clone()]);
            if first > config.field_threshold {
                matched_fields.insert(columns.first_name.clone());
            }
            if last > config.field_threshold {
                matched_fields.insert(columns.last_name.clone());
            }
            Some(MatchCandidate {
                row,
                score,
                matched_fields,
            })
        })
        .collect();

    candidates.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| compare_keys(&left.row, &right.row, key_column))
    });

    tracing::debug!(
        event = "candidates_scored",
        strategy = strategy,
        fetched = fetched,
        accepted = candidates.len(),
    );
    Ok(candidates)
}

async fn fetch<E>(
    plan: &QueryPlan,
    executor: &E,
    strategy: &'static str,
) -> Result<Vec<Row>, ResolveError>
where
    E: Executor + ?Sized,
{
    let statement = build_query(plan)?;
    tracing::debug!(
        event = "statement_execute",
        strategy = strategy,
        tables = plan.tables.len(),
        parameters = %describe_parameters(&statement.parameters),
    );
    let rows = executor
        .execute(&statement.text, &statement.parameters)
        .await?;
    Ok(rows)
}

fn field_similarity(row: &Row, column: &str, expected: &str) -> f64 {
    row.get(column)
        .and_then(SqlValue::as_text)
        .map(|actual| name_similarity(&actual, expected))
        .unwrap_or(0.0)
}

fn compare_keys(left: &Row, right: &Row, key_column: &str) -> Ordering {
    let left = left.get(key_column).unwrap_or(&SqlValue::Null);
    let right = right.get(key_column).unwrap_or(&SqlValue::Null);
    left.key_cmp(right)
}
