use super::PgStore;
use crate::domain::batch::{BatchEntry, RecommendationBatch};
use crate::orchestrator::BatchStore;
use crate::pool::RecommendationHistory;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

#[async_trait::async_trait]
impl BatchStore for PgStore {
    async fn find_batch(
        &self,
        user_id: Uuid,
        market_key: &str,
        week_start: NaiveDate,
    ) -> anyhow::Result<Option<RecommendationBatch>> {
        let row: Option<(Uuid, f64, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, lambda, total_candidates, generated_at \
             FROM recommendation_batches \
             WHERE user_id = $1 AND market_key = $2 AND week_start = $3",
        )
        .persistent(false)
        .bind(user_id)
        .bind(market_key)
        .bind(week_start)
        .fetch_optional(&self.pool)
        .await
        .context("select recommendation_batches failed")?;

        let Some((batch_id, lambda, total_candidates, generated_at)) = row else {
            return Ok(None);
        };

        let entry_rows: Vec<(i32, String, f64, f64, f64, Vec<String>, bool)> = sqlx::query_as(
            "SELECT position, property_id, relevance, diversity, combined, reasons, decided \
             FROM recommendation_entries WHERE batch_id = $1 ORDER BY position",
        )
        .persistent(false)
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .context("select recommendation_entries failed")?;

        let entries = entry_rows
            .into_iter()
            .map(
                |(position, property_id, relevance, diversity, combined, reasons, decided)| {
                    BatchEntry {
                        position,
                        property_id,
                        relevance,
                        diversity,
                        combined,
                        reasons,
                        decided,
                    }
                },
            )
            .collect();

        Ok(Some(RecommendationBatch {
            batch_id,
            user_id,
            market_key: market_key.to_string(),
            week_start,
            lambda,
            total_candidates,
            generated_at,
            entries,
        }))
    }

    async fn insert_batch(&self, batch: &RecommendationBatch) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        // The unique key on (user_id, market_key, week_start) makes this a
        // no-op for the loser of a concurrent run.
        let inserted = sqlx::query(
            "INSERT INTO recommendation_batches \
               (id, user_id, market_key, week_start, lambda, total_candidates, generated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, market_key, week_start) DO NOTHING",
        )
        .persistent(false)
        .bind(batch.batch_id)
        .bind(batch.user_id)
        .bind(&batch.market_key)
        .bind(batch.week_start)
        .bind(batch.lambda)
        .bind(batch.total_candidates)
        .bind(batch.generated_at)
        .execute(&mut *tx)
        .await
        .context("insert recommendation_batches failed")?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.context("rollback failed")?;
            return Ok(false);
        }

        if !batch.entries.is_empty() {
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO recommendation_entries \
                   (batch_id, position, property_id, relevance, diversity, combined, reasons, decided) ",
            );
            qb.push_values(&batch.entries, |mut b, entry| {
                b.push_bind(batch.batch_id)
                    .push_bind(entry.position)
                    .push_bind(&entry.property_id)
                    .push_bind(entry.relevance)
                    .push_bind(entry.diversity)
                    .push_bind(entry.combined)
                    .push_bind(&entry.reasons)
                    .push_bind(entry.decided);
            });
            qb.build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("insert recommendation_entries failed")?;
        }

        tx.commit().await.context("commit transaction failed")?;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl RecommendationHistory for PgStore {
    async fn decided_property_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT property_id FROM user_decisions WHERE user_id = $1",
        )
        .persistent(false)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("select user_decisions failed")?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn shown_property_ids_since(
        &self,
        user_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<String>> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT e.property_id \
             FROM recommendation_entries e \
             JOIN recommendation_batches b ON b.id = e.batch_id \
             WHERE b.user_id = $1 AND b.generated_at >= $2",
        )
        .persistent(false)
        .bind(user_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("select shown recommendation_entries failed")?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
