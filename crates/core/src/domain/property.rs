use serde::{Deserialize, Serialize};

/// An inventory property as seen by the recommendation core. Owned and
/// mutated upstream; immutable here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub property_id: String,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub property_type: Option<String>,
    pub units_count: Option<i32>,
    pub year_built: Option<i32>,
    pub square_feet: Option<f64>,
    pub listing_price: Option<f64>,
    pub estimated_value: Option<f64>,
    pub assessed_value: Option<f64>,
    pub estimated_equity: Option<f64>,
    pub years_owned: Option<f64>,
    pub pre_foreclosure: bool,
    pub auction: bool,
    pub reo: bool,
    pub tax_lien: bool,
    pub mls_active: bool,
    pub for_sale: bool,
    pub out_of_state_absentee_owner: bool,
    pub in_state_absentee_owner: bool,
    pub corporate_owned: bool,
}

impl Property {
    /// Preferred price anchor: listing > estimated > assessed.
    pub fn price_anchor(&self) -> Option<f64> {
        self.listing_price
            .or(self.estimated_value)
            .or(self.assessed_value)
    }

    /// Number of active distress flags (pre-foreclosure, auction, REO, tax lien).
    pub fn distress_flag_count(&self) -> u32 {
        [self.pre_foreclosure, self.auction, self.reo, self.tax_lien]
            .iter()
            .filter(|f| **f)
            .count() as u32
    }

    pub fn is_absentee_owned(&self) -> bool {
        self.out_of_state_absentee_owner || self.in_state_absentee_owner
    }

    pub fn is_on_market(&self) -> bool {
        self.mls_active || self.for_sale
    }

    pub fn is_multifamily_type(&self) -> bool {
        self.property_type
            .as_deref()
            .map(|t| t.to_lowercase().contains("multi"))
            .unwrap_or(false)
    }
}

/// A user's target profile for one market. Read-only to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyBox {
    /// Stable market identifier (e.g. "austin_tx" or a postal code).
    pub market_key: String,
    /// Normalized market names used for inventory filtering
    /// ("city, state" or postal codes).
    pub markets: Vec<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub units_min: Option<i32>,
    pub units_max: Option<i32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}

impl BuyBox {
    pub fn price_range(&self) -> Option<(f64, f64)> {
        match (self.price_min, self.price_max) {
            (Some(lo), Some(hi)) if lo <= hi => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn units_range(&self) -> Option<(i32, i32)> {
        match (self.units_min, self.units_max) {
            (Some(lo), Some(hi)) if lo <= hi => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn year_range(&self) -> Option<(i32, i32)> {
        match (self.year_min, self.year_max) {
            (Some(lo), Some(hi)) if lo <= hi => Some((lo, hi)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_property() -> Property {
        Property {
            property_id: "p-1".to_string(),
            address_city: None,
            address_state: None,
            address_zip: None,
            latitude: None,
            longitude: None,
            property_type: None,
            units_count: None,
            year_built: None,
            square_feet: None,
            listing_price: None,
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

    #[test]
    fn price_anchor_prefers_listing_then_estimated_then_assessed() {
        let mut p = bare_property();
        assert_eq!(p.price_anchor(), None);

        p.assessed_value = Some(250_000.0);
        assert_eq!(p.price_anchor(), Some(250_000.0));

        p.estimated_value = Some(300_000.0);
        assert_eq!(p.price_anchor(), Some(300_000.0));

        p.listing_price = Some(320_000.0);
        assert_eq!(p.price_anchor(), Some(320_000.0));
    }

    #[test]
    fn distress_flags_count_all_four() {
        let mut p = bare_property();
        assert_eq!(p.distress_flag_count(), 0);
        p.pre_foreclosure = true;
        p.tax_lien = true;
        assert_eq!(p.distress_flag_count(), 2);
        p.auction = true;
        p.reo = true;
        assert_eq!(p.distress_flag_count(), 4);
    }

    #[test]
    fn inverted_ranges_are_ignored() {
        let bb = BuyBox {
            market_key: "test".to_string(),
            price_min: Some(400_000.0),
            price_max: Some(200_000.0),
            ..Default::default()
        };
        assert_eq!(bb.price_range(), None);
    }
}
