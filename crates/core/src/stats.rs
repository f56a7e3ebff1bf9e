use crate::domain::property::Property;
use crate::pool::Inventory;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Robust per-market statistics used to normalize raw property values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatistics {
    pub market_key: String,
    pub price_per_unit_median: f64,
    pub price_per_unit_iqr: f64,
    pub units_median: f64,
    pub units_iqr: f64,
    pub vintage_median: f64,
    pub vintage_iqr: f64,
    /// Distance scale (km) for geographic similarity decay.
    pub geo_diversity_scale_km: f64,
    /// Inventory sample size the record was computed from. 0 for defaults.
    pub sample_size: i32,
    pub computed_at: Option<DateTime<Utc>>,
}

// Fallback constants for markets with no usable inventory sample.
pub const DEFAULT_PRICE_PER_UNIT_MEDIAN: f64 = 100_000.0;
pub const DEFAULT_PRICE_PER_UNIT_IQR: f64 = 50_000.0;
pub const DEFAULT_UNITS_MEDIAN: f64 = 20.0;
pub const DEFAULT_UNITS_IQR: f64 = 15.0;
pub const DEFAULT_VINTAGE_MEDIAN: f64 = 1990.0;
pub const DEFAULT_VINTAGE_IQR: f64 = 25.0;
pub const DEFAULT_GEO_DIVERSITY_SCALE_KM: f64 = 5.0;

impl MarketStatistics {
    pub fn default_for(market_key: &str) -> Self {
        Self {
            market_key: market_key.to_string(),
            price_per_unit_median: DEFAULT_PRICE_PER_UNIT_MEDIAN,
            price_per_unit_iqr: DEFAULT_PRICE_PER_UNIT_IQR,
            units_median: DEFAULT_UNITS_MEDIAN,
            units_iqr: DEFAULT_UNITS_IQR,
            vintage_median: DEFAULT_VINTAGE_MEDIAN,
            vintage_iqr: DEFAULT_VINTAGE_IQR,
            geo_diversity_scale_km: DEFAULT_GEO_DIVERSITY_SCALE_KM,
            sample_size: 0,
            computed_at: None,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.computed_at {
            Some(at) => now - at > max_age,
            None => true,
        }
    }
}

/// Precomputed market statistics rows: read on every run, refreshed
/// whenever a sample had to be taken.
#[async_trait::async_trait]
pub trait StatsStore: Send + Sync {
    async fn fetch_statistics(
        &self,
        market_key: &str,
    ) -> anyhow::Result<Option<MarketStatistics>>;

    async fn store_statistics(&self, stats: &MarketStatistics) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct StatsParams {
    pub sample_limit: usize,
    /// Below this many valid samples the defaults are used instead.
    pub min_samples: usize,
    pub max_age_days: i64,
}

impl Default for StatsParams {
    fn default() -> Self {
        Self {
            sample_limit: 500,
            min_samples: 10,
            max_age_days: 30,
        }
    }
}

/// Market statistics with fallback: precomputed row, then an on-the-fly
/// sample, then hard defaults. Infallible so scoring never blocks on it.
pub struct StatsProvider<'a> {
    store: &'a dyn StatsStore,
    inventory: &'a dyn Inventory,
    params: StatsParams,
}

impl<'a> StatsProvider<'a> {
    pub fn new(store: &'a dyn StatsStore, inventory: &'a dyn Inventory) -> Self {
        Self {
            store,
            inventory,
            params: StatsParams::default(),
        }
    }

    pub fn with_params(mut self, params: StatsParams) -> Self {
        self.params = params;
        self
    }

    pub async fn get_statistics(
        &self,
        market_key: &str,
        markets: &[String],
        now: DateTime<Utc>,
    ) -> MarketStatistics {
        match self.store.fetch_statistics(market_key).await {
            Ok(Some(stats))
                if !stats.is_stale(now, Duration::days(self.params.max_age_days)) =>
            {
                return stats;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(market_key, error = %err, "market statistics lookup failed; sampling inventory");
            }
        }

        let sample = match self
            .inventory
            .sample_market(markets, self.params.sample_limit)
            .await
        {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(market_key, error = %err, "inventory sample failed; using default statistics");
                return MarketStatistics::default_for(market_key);
            }
        };

        match compute_from_sample(market_key, &sample, self.params.min_samples, now) {
            Some(stats) => {
                // Best-effort write-back so the next run reads the row
                // instead of re-sampling.
                if let Err(err) = self.store.store_statistics(&stats).await {
                    tracing::warn!(market_key, error = %err, "failed to store market statistics");
                }
                stats
            }
            None => {
                tracing::info!(
                    market_key,
                    sample_len = sample.len(),
                    "too few valid samples; using default statistics"
                );
                MarketStatistics::default_for(market_key)
            }
        }
    }
}

/// Positional (non-interpolated) median: the value at the middle index of
/// the sorted, non-empty sample.
fn median(sorted: &[f64]) -> f64 {
    sorted[sorted.len() / 2]
}

/// Positional IQR: value at the 75th percentile index minus value at the
/// 25th percentile index.
fn iqr(sorted: &[f64]) -> f64 {
    let q1 = sorted[sorted.len() / 4];
    let q3 = sorted[sorted.len() * 3 / 4];
    q3 - q1
}

pub fn compute_from_sample(
    market_key: &str,
    sample: &[Property],
    min_samples: usize,
    now: DateTime<Utc>,
) -> Option<MarketStatistics> {
    let mut price_per_unit = Vec::new();
    let mut units = Vec::new();
    let mut vintages = Vec::new();

    for p in sample {
        let (Some(price), Some(unit_count), Some(year)) =
            (p.price_anchor(), p.units_count, p.year_built)
        else {
            continue;
        };
        if price <= 0.0 || unit_count <= 0 || year <= 1900 {
            continue;
        }
        price_per_unit.push(price / unit_count as f64);
        units.push(unit_count as f64);
        vintages.push(year as f64);
    }

    if price_per_unit.is_empty() || price_per_unit.len() < min_samples {
        return None;
    }

    price_per_unit.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    units.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    vintages.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Some(MarketStatistics {
        market_key: market_key.to_string(),
        price_per_unit_median: median(&price_per_unit),
        price_per_unit_iqr: iqr(&price_per_unit),
        units_median: median(&units),
        units_iqr: iqr(&units),
        vintage_median: median(&vintages),
        vintage_iqr: iqr(&vintages),
        geo_diversity_scale_km: DEFAULT_GEO_DIVERSITY_SCALE_KM,
        sample_size: price_per_unit.len() as i32,
        computed_at: Some(now),
    })
}
