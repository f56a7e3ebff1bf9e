use crate::domain::property::{BuyBox, Property};
use anyhow::ensure;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Hard pre-scoring filter handed to the inventory. Bounds cost, not final
/// fit; the scorer applies the soft version of the same ranges.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub markets: Vec<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub units_min: Option<i32>,
    pub units_max: Option<i32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub exclude_ids: Vec<String>,
    pub limit: usize,
}

/// Query capability over the property inventory. The core has no opinion on
/// where the inventory lives.
#[async_trait::async_trait]
pub trait Inventory: Send + Sync {
    async fn query(&self, filter: &InventoryFilter) -> anyhow::Result<Vec<Property>>;

    /// Unfiltered market sample for on-the-fly statistics.
    async fn sample_market(
        &self,
        markets: &[String],
        limit: usize,
    ) -> anyhow::Result<Vec<Property>>;
}

/// What the user has already seen or decided on; used for exclusions.
#[async_trait::async_trait]
pub trait RecommendationHistory: Send + Sync {
    /// Property ids the user has actively saved or explicitly rejected.
    async fn decided_property_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<String>>;

    /// Property ids recommended to the user since the cutoff.
    async fn shown_property_ids_since(
        &self,
        user_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_pool_size: usize,
    /// Weeks a shown property stays ineligible for resurfacing.
    pub resurface_window_weeks: i64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 200,
            resurface_window_weeks: 8,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.max_pool_size > 0,
            "max_pool_size must be positive (got {})",
            self.max_pool_size
        );
        ensure!(
            self.resurface_window_weeks > 0,
            "resurface_window_weeks must be positive (got {})",
            self.resurface_window_weeks
        );
        Ok(())
    }
}

/// Builds the bounded candidate pool for one user x buy box. Any data-access
/// failure degrades to an empty pool; the orchestrator treats that as "no
/// recommendations this cycle", never a hard error.
pub async fn build_pool(
    inventory: &dyn Inventory,
    history: &dyn RecommendationHistory,
    user_id: Uuid,
    buy_box: &BuyBox,
    cfg: &PoolConfig,
    now: DateTime<Utc>,
) -> Vec<Property> {
    let mut exclude_ids = match history.decided_property_ids(user_id).await {
        Ok(ids) => ids,
        Err(err) => {
            tracing::warn!(%user_id, error = %err, "decided-property lookup failed; returning empty pool");
            return Vec::new();
        }
    };

    let cutoff = now - Duration::weeks(cfg.resurface_window_weeks);
    match history.shown_property_ids_since(user_id, cutoff).await {
        Ok(shown) => exclude_ids.extend(shown),
        Err(err) => {
            tracing::warn!(%user_id, error = %err, "resurfacing lookup failed; returning empty pool");
            return Vec::new();
        }
    }
    exclude_ids.sort();
    exclude_ids.dedup();

    let filter = InventoryFilter {
        markets: buy_box.markets.clone(),
        price_min: buy_box.price_min,
        price_max: buy_box.price_max,
        units_min: buy_box.units_min,
        units_max: buy_box.units_max,
        year_min: buy_box.year_min,
        year_max: buy_box.year_max,
        exclude_ids,
        limit: cfg.max_pool_size,
    };

    match inventory.query(&filter).await {
        Ok(mut pool) => {
            pool.truncate(cfg.max_pool_size);
            tracing::debug!(
                %user_id,
                market_key = %buy_box.market_key,
                pool_len = pool.len(),
                "candidate pool built"
            );
            pool
        }
        Err(err) => {
            tracing::warn!(%user_id, error = %err, "inventory query failed; returning empty pool");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn property(id: &str) -> Property {
        Property {
            property_id: id.to_string(),
            address_city: Some("Austin".to_string()),
            address_state: Some("TX".to_string()),
            address_zip: None,
            latitude: None,
            longitude: None,
            property_type: Some("Multifamily".to_string()),
            units_count: Some(12),
            year_built: Some(1990),
            square_feet: None,
            listing_price: Some(300_000.0),
            estimated_value: None,
            assessed_value: None,
            estimated_equity: None,
            years_owned: None,
            pre_foreclosure: false,
            auction: false,
            reo: false,
            tax_lien: false,
            mls_active: false,
            for_sale: false,
            out_of_state_absentee_owner: false,
            in_state_absentee_owner: false,
            corporate_owned: false,
        }
    }

    struct FakeInventory {
        properties: Vec<Property>,
        seen_filter: Mutex<Option<InventoryFilter>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Inventory for FakeInventory {
        async fn query(&self, filter: &InventoryFilter) -> anyhow::Result<Vec<Property>> {
            if self.fail {
                anyhow::bail!("inventory unavailable");
            }
            *self.seen_filter.lock().unwrap() = Some(filter.clone());
            Ok(self
                .properties
                .iter()
                .filter(|p| !filter.exclude_ids.contains(&p.property_id))
                .take(filter.limit)
                .cloned()
                .collect())
        }

        async fn sample_market(
            &self,
            _markets: &[String],
            limit: usize,
        ) -> anyhow::Result<Vec<Property>> {
            Ok(self.properties.iter().take(limit).cloned().collect())
        }
    }

    struct FakeHistory {
        decided: Vec<String>,
        shown: Vec<String>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl RecommendationHistory for FakeHistory {
        async fn decided_property_ids(&self, _user_id: Uuid) -> anyhow::Result<Vec<String>> {
            if self.fail {
                anyhow::bail!("history unavailable");
            }
            Ok(self.decided.clone())
        }

        async fn shown_property_ids_since(
            &self,
            _user_id: Uuid,
            _cutoff: DateTime<Utc>,
        ) -> anyhow::Result<Vec<String>> {
            Ok(self.shown.clone())
        }
    }

    fn buy_box() -> BuyBox {
        BuyBox {
            market_key: "austin_tx".to_string(),
            markets: vec!["Austin, TX".to_string()],
            price_min: Some(200_000.0),
            price_max: Some(400_000.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn excludes_decided_and_recently_shown() {
        let inventory = FakeInventory {
            properties: vec![property("a"), property("b"), property("c"), property("d")],
            seen_filter: Mutex::new(None),
            fail: false,
        };
        let history = FakeHistory {
            decided: vec!["a".to_string()],
            shown: vec!["b".to_string()],
            fail: false,
        };

        let pool = build_pool(
            &inventory,
            &history,
            Uuid::nil(),
            &buy_box(),
            &PoolConfig::default(),
            Utc::now(),
        )
        .await;

        let ids: Vec<&str> = pool.iter().map(|p| p.property_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);

        let filter = inventory.seen_filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.markets, vec!["Austin, TX".to_string()]);
        assert_eq!(filter.price_min, Some(200_000.0));
        assert_eq!(filter.limit, 200);
    }

    #[tokio::test]
    async fn pool_is_capped() {
        let inventory = FakeInventory {
            properties: (0..50).map(|i| property(&format!("p-{i:02}"))).collect(),
            seen_filter: Mutex::new(None),
            fail: false,
        };
        let history = FakeHistory {
            decided: vec![],
            shown: vec![],
            fail: false,
        };
        let cfg = PoolConfig {
            max_pool_size: 10,
            resurface_window_weeks: 8,
        };

        let pool = build_pool(&inventory, &history, Uuid::nil(), &buy_box(), &cfg, Utc::now()).await;
        assert_eq!(pool.len(), 10);
    }

    #[tokio::test]
    async fn data_access_errors_degrade_to_empty_pool() {
        let inventory = FakeInventory {
            properties: vec![property("a")],
            seen_filter: Mutex::new(None),
            fail: true,
        };
        let history = FakeHistory {
            decided: vec![],
            shown: vec![],
            fail: false,
        };
        let pool = build_pool(
            &inventory,
            &history,
            Uuid::nil(),
            &buy_box(),
            &PoolConfig::default(),
            Utc::now(),
        )
        .await;
        assert!(pool.is_empty());

        let inventory = FakeInventory {
            properties: vec![property("a")],
            seen_filter: Mutex::new(None),
            fail: false,
        };
        let history = FakeHistory {
            decided: vec![],
            shown: vec![],
            fail: true,
        };
        let pool = build_pool(
            &inventory,
            &history,
            Uuid::nil(),
            &buy_box(),
            &PoolConfig::default(),
            Utc::now(),
        )
        .await;
        assert!(pool.is_empty());
    }

    #[test]
    fn config_validation_rejects_zero_sizes() {
        assert!(PoolConfig {
            max_pool_size: 0,
            resurface_window_weeks: 8
        }
        .validate()
        .is_err());
        assert!(PoolConfig {
            max_pool_size: 200,
            resurface_window_weeks: 0
        }
        .validate()
        .is_err());
    }
}
