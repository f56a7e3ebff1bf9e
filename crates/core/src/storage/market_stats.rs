use super::PgStore;
use crate::stats::{MarketStatistics, StatsStore};
use anyhow::Context;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
impl StatsStore for PgStore {
    async fn fetch_statistics(
        &self,
        market_key: &str,
    ) -> anyhow::Result<Option<MarketStatistics>> {
        type Row = (f64, f64, f64, f64, f64, f64, f64, i32, DateTime<Utc>);
        let row: Option<Row> = sqlx::query_as(
            "SELECT price_per_unit_median, price_per_unit_iqr, units_median, units_iqr, \
                    vintage_median, vintage_iqr, geo_diversity_scale_km, sample_size, computed_at \
             FROM market_statistics WHERE market_key = $1",
        )
        .persistent(false)
        .bind(market_key)
        .fetch_optional(&self.pool)
        .await
        .context("select market_statistics failed")?;

        Ok(row.map(
            |(
                price_per_unit_median,
                price_per_unit_iqr,
                units_median,
                units_iqr,
                vintage_median,
                vintage_iqr,
                geo_diversity_scale_km,
                sample_size,
                computed_at,
            )| MarketStatistics {
                market_key: market_key.to_string(),
                price_per_unit_median,
                price_per_unit_iqr,
                units_median,
                units_iqr,
                vintage_median,
                vintage_iqr,
                geo_diversity_scale_km,
                sample_size,
                computed_at: Some(computed_at),
            },
        ))
    }

    async fn store_statistics(&self, stats: &MarketStatistics) -> anyhow::Result<()> {
        upsert_statistics(&self.pool, stats).await
    }
}

/// Writes a freshly computed statistics row, replacing any previous one for
/// the market.
pub async fn upsert_statistics(
    pool: &sqlx::PgPool,
    stats: &MarketStatistics,
) -> anyhow::Result<()> {
    let computed_at = stats.computed_at.unwrap_or_else(Utc::now);
    sqlx::query(
        "INSERT INTO market_statistics \
           (market_key, price_per_unit_median, price_per_unit_iqr, units_median, units_iqr, \
            vintage_median, vintage_iqr, geo_diversity_scale_km, sample_size, computed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (market_key) DO UPDATE \
           SET price_per_unit_median = EXCLUDED.price_per_unit_median, \
               price_per_unit_iqr = EXCLUDED.price_per_unit_iqr, \
               units_median = EXCLUDED.units_median, \
               units_iqr = EXCLUDED.units_iqr, \
               vintage_median = EXCLUDED.vintage_median, \
               vintage_iqr = EXCLUDED.vintage_iqr, \
               geo_diversity_scale_km = EXCLUDED.geo_diversity_scale_km, \
               sample_size = EXCLUDED.sample_size, \
               computed_at = EXCLUDED.computed_at",
    )
    .persistent(false)
    .bind(&stats.market_key)
    .bind(stats.price_per_unit_median)
    .bind(stats.price_per_unit_iqr)
    .bind(stats.units_median)
    .bind(stats.units_iqr)
    .bind(stats.vintage_median)
    .bind(stats.vintage_iqr)
    .bind(stats.geo_diversity_scale_km)
    .bind(stats.sample_size)
    .bind(computed_at)
    .execute(pool)
    .await
    .context("upsert market_statistics failed")?;
    Ok(())
}
