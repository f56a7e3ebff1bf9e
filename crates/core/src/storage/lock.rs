use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

// Advisory locks are scoped to the Postgres session. This is used as a
// best-effort guard against concurrent batch generation for the same
// user x market x week.
const LOCK_NAMESPACE: i64 = 0x444F_4F52_5354; // "DOORST" as hex-ish namespace.

fn lock_key(user_id: Uuid, market_key: &str, week_start: NaiveDate) -> i64 {
    // DefaultHasher::new() uses fixed keys, so the value is stable across
    // processes.
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    market_key.hash(&mut hasher);
    let scope = hasher.finish() as i64;
    LOCK_NAMESPACE ^ scope ^ i64::from(week_start.num_days_from_ce())
}

pub async fn try_acquire_batch_lock(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    market_key: &str,
    week_start: NaiveDate,
) -> anyhow::Result<bool> {
    let key = lock_key(user_id, market_key, week_start);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_batch_lock(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    market_key: &str,
    week_start: NaiveDate,
) -> anyhow::Result<()> {
    let key = lock_key(user_id, market_key, week_start);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(())
}
