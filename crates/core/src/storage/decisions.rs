use crate::domain::batch::{Decision, UserDecision};
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Appends one decision and, when it refers to a batch entry, marks that
/// entry decided. Single transaction so the entry flag never drifts from the
/// decision log.
pub async fn record_decision(
    pool: &sqlx::PgPool,
    decision: &UserDecision,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO user_decisions \
           (id, user_id, market_key, property_id, batch_id, decision, from_algorithm, \
            relevance, diversity, decided_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .persistent(false)
    .bind(id)
    .bind(decision.user_id)
    .bind(&decision.market_key)
    .bind(&decision.property_id)
    .bind(decision.batch_id)
    .bind(decision.decision.as_str())
    .bind(decision.from_algorithm)
    .bind(decision.relevance)
    .bind(decision.diversity)
    .bind(decision.decided_at)
    .execute(&mut *tx)
    .await
    .context("insert user_decisions failed")?;

    if let Some(batch_id) = decision.batch_id {
        sqlx::query(
            "UPDATE recommendation_entries SET decided = TRUE \
             WHERE batch_id = $1 AND property_id = $2",
        )
        .persistent(false)
        .bind(batch_id)
        .bind(&decision.property_id)
        .execute(&mut *tx)
        .await
        .context("update recommendation_entries decided failed")?;
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(id)
}

/// Decisions for one user x market since the cutoff, newest first. Rows with
/// an unknown decision label are skipped rather than failing the read.
pub async fn recent_decisions(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    market_key: &str,
    cutoff: DateTime<Utc>,
) -> anyhow::Result<Vec<UserDecision>> {
    type Row = (
        String,
        Option<Uuid>,
        String,
        bool,
        Option<f64>,
        Option<f64>,
        DateTime<Utc>,
    );
    let rows: Vec<Row> = sqlx::query_as(
        "SELECT property_id, batch_id, decision, from_algorithm, relevance, diversity, decided_at \
         FROM user_decisions \
         WHERE user_id = $1 AND market_key = $2 AND decided_at >= $3 \
         ORDER BY decided_at DESC",
    )
    .persistent(false)
    .bind(user_id)
    .bind(market_key)
    .bind(cutoff)
    .fetch_all(pool)
    .await
    .context("select user_decisions failed")?;

    let mut decisions = Vec::with_capacity(rows.len());
    for (property_id, batch_id, label, from_algorithm, relevance, diversity, decided_at) in rows {
        let Some(decision) = Decision::parse(&label) else {
            tracing::warn!(%user_id, property_id, label, "skipping decision with unknown label");
            continue;
        };
        decisions.push(UserDecision {
            user_id,
            market_key: market_key.to_string(),
            property_id,
            batch_id,
            decision,
            from_algorithm,
            relevance,
            diversity,
            decided_at,
        });
    }
    Ok(decisions)
}
