use crate::lambda::LambdaState;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Loads the stored lambda for one user x market, falling back to the
/// default state when none has been saved yet.
pub async fn load_lambda_state(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    market_key: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<LambdaState> {
    let row: Option<(f64, DateTime<Utc>)> = sqlx::query_as(
        "SELECT lambda, updated_at FROM lambda_state WHERE user_id = $1 AND market_key = $2",
    )
    .persistent(false)
    .bind(user_id)
    .bind(market_key)
    .fetch_optional(pool)
    .await
    .context("select lambda_state failed")?;

    Ok(match row {
        Some((lambda, updated_at)) => LambdaState {
            user_id,
            market_key: market_key.to_string(),
            lambda,
            updated_at,
        },
        None => LambdaState::initial(user_id, market_key, now),
    })
}

pub async fn save_lambda_state(
    pool: &sqlx::PgPool,
    state: &LambdaState,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO lambda_state (user_id, market_key, lambda, updated_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, market_key) DO UPDATE \
           SET lambda = EXCLUDED.lambda, updated_at = EXCLUDED.updated_at",
    )
    .persistent(false)
    .bind(state.user_id)
    .bind(&state.market_key)
    .bind(state.lambda)
    .bind(state.updated_at)
    .execute(pool)
    .await
    .context("upsert lambda_state failed")?;
    Ok(())
}
