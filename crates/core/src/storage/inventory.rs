use super::PgStore;
use crate::domain::property::Property;
use crate::pool::{Inventory, InventoryFilter};
use anyhow::Context;

const PROPERTY_COLUMNS: &str = "property_id, address_city, address_state, address_zip, \
     latitude, longitude, property_type, units_count, year_built, square_feet, \
     listing_price, estimated_value, assessed_value, estimated_equity, years_owned, \
     pre_foreclosure, auction, reo, tax_lien, mls_active, for_sale, \
     out_of_state_absentee_owner, in_state_absentee_owner, corporate_owned";

#[async_trait::async_trait]
impl Inventory for PgStore {
    async fn query(&self, filter: &InventoryFilter) -> anyhow::Result<Vec<Property>> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE market = ANY("
        ));
        qb.push_bind(&filter.markets);
        qb.push(")");

        if let Some(min) = filter.price_min {
            qb.push(" AND COALESCE(listing_price, estimated_value, assessed_value) >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filter.price_max {
            qb.push(" AND COALESCE(listing_price, estimated_value, assessed_value) <= ");
            qb.push_bind(max);
        }
        if let Some(min) = filter.units_min {
            qb.push(" AND units_count >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filter.units_max {
            qb.push(" AND units_count <= ");
            qb.push_bind(max);
        }
        if let Some(min) = filter.year_min {
            qb.push(" AND year_built >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filter.year_max {
            qb.push(" AND year_built <= ");
            qb.push_bind(max);
        }
        if !filter.exclude_ids.is_empty() {
            qb.push(" AND property_id <> ALL(");
            qb.push_bind(&filter.exclude_ids);
            qb.push(")");
        }

        // Freshest rows first so the cap keeps recently updated inventory.
        qb.push(" ORDER BY updated_at DESC, property_id LIMIT ");
        qb.push_bind(filter.limit as i64);

        let properties = qb
            .build_query_as::<Property>()
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .context("inventory query failed")?;
        Ok(properties)
    }

    async fn sample_market(
        &self,
        markets: &[String],
        limit: usize,
    ) -> anyhow::Result<Vec<Property>> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE market = ANY($1) ORDER BY updated_at DESC, property_id LIMIT $2"
        ))
        .persistent(false)
        .bind(markets)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("market sample query failed")?;
        Ok(properties)
    }
}
