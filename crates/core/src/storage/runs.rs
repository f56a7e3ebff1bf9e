use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Bookkeeping row for one worker invocation, written regardless of outcome.
pub async fn record_recommendation_run(
    pool: &sqlx::PgPool,
    week_start: NaiveDate,
    started_at: DateTime<Utc>,
    status: &str,
    error: Option<&str>,
    details: Option<Value>,
    users_processed: i32,
    batches_created: i32,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let finished_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO recommendation_runs \
           (id, week_start, started_at, finished_at, status, error, details, users_processed, batches_created) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .persistent(false)
    .bind(id)
    .bind(week_start)
    .bind(started_at)
    .bind(finished_at)
    .bind(status)
    .bind(error)
    .bind(details)
    .bind(users_processed)
    .bind(batches_created)
    .execute(pool)
    .await
    .context("insert recommendation_runs failed")?;

    Ok(id)
}
