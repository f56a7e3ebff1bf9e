use crate::domain::property::{BuyBox, Property};
use crate::stats::MarketStatistics;
use anyhow::ensure;
use serde::{Deserialize, Serialize};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Factor weights and the hand-tuned partial-credit constants. The
/// out-of-range constants deliberately soften rather than disqualify;
/// override them instead of re-deriving.
#[derive(Debug, Clone)]
pub struct ScoringParams {
    pub weight_price: f64,
    pub weight_units: f64,
    pub weight_vintage: f64,
    pub weight_deal_signals: f64,
    pub weight_on_market: f64,
    pub weight_owner_profile: f64,

    /// Multiplier applied to price closeness when the anchor falls outside
    /// the buy-box range.
    pub out_of_range_price_damping: f64,
    /// Units sub-score for out-of-range but still multifamily (>= 2 units).
    pub out_of_range_units_multifamily: f64,
    /// Units sub-score for a single-unit property.
    pub out_of_range_units_single: f64,
    /// Floor area assumed per unit when estimating unit count.
    pub sqft_per_unit: f64,
    /// Score penalty when units were estimated from floor area.
    pub estimated_units_penalty: f64,
    /// Score penalty when unit count is unknown and not estimable.
    pub missing_units_penalty: f64,

    /// Construction-year window that earns a small multiplicative bonus
    /// (renovation opportunity vs deferred maintenance balance).
    pub vintage_bonus_from: i32,
    pub vintage_bonus_to: i32,
    pub vintage_bonus_multiplier: f64,

    pub neutral_price_fit: f64,
    pub neutral_units_fit: f64,
    /// Units sub-score when the count is known multifamily but the buy box
    /// sets no unit bounds.
    pub unbounded_multifamily_units_fit: f64,
    pub neutral_vintage_fit: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            weight_price: 0.35,
            weight_units: 0.20,
            weight_vintage: 0.10,
            weight_deal_signals: 0.25,
            weight_on_market: 0.05,
            weight_owner_profile: 0.05,
            out_of_range_price_damping: 0.3,
            out_of_range_units_multifamily: 0.4,
            out_of_range_units_single: 0.1,
            sqft_per_unit: 900.0,
            estimated_units_penalty: 0.02,
            missing_units_penalty: 0.08,
            vintage_bonus_from: 1980,
            vintage_bonus_to: 2000,
            vintage_bonus_multiplier: 1.1,
            neutral_price_fit: 0.5,
            neutral_units_fit: 0.6,
            unbounded_multifamily_units_fit: 0.7,
            neutral_vintage_fit: 0.6,
        }
    }
}

impl ScoringParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        let weights = [
            self.weight_price,
            self.weight_units,
            self.weight_vintage,
            self.weight_deal_signals,
            self.weight_on_market,
            self.weight_owner_profile,
        ];
        for w in weights {
            ensure!((0.0..=1.0).contains(&w), "factor weight out of [0,1]: {w}");
        }
        let sum: f64 = weights.iter().sum();
        ensure!(
            (sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE,
            "factor weights must sum to 1.0 (got {sum})"
        );
        ensure!(
            self.sqft_per_unit > 0.0,
            "sqft_per_unit must be positive (got {})",
            self.sqft_per_unit
        );
        for (name, v) in [
            ("out_of_range_price_damping", self.out_of_range_price_damping),
            (
                "out_of_range_units_multifamily",
                self.out_of_range_units_multifamily,
            ),
            ("out_of_range_units_single", self.out_of_range_units_single),
            ("estimated_units_penalty", self.estimated_units_penalty),
            ("missing_units_penalty", self.missing_units_penalty),
            ("neutral_price_fit", self.neutral_price_fit),
            ("neutral_units_fit", self.neutral_units_fit),
            (
                "unbounded_multifamily_units_fit",
                self.unbounded_multifamily_units_fit,
            ),
            ("neutral_vintage_fit", self.neutral_vintage_fit),
        ] {
            ensure!((0.0..=1.0).contains(&v), "{name} out of [0,1]: {v}");
        }
        ensure!(
            self.vintage_bonus_multiplier >= 1.0,
            "vintage_bonus_multiplier must be >= 1.0 (got {})",
            self.vintage_bonus_multiplier
        );
        Ok(())
    }
}

/// Per-factor sub-scores, each in [0,1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FactorScores {
    pub price_fit: f64,
    pub units_fit: f64,
    pub vintage_fit: f64,
    pub deal_signals: f64,
    pub on_market_fit: f64,
    pub owner_profile_fit: f64,
}

/// A property scored against one buy box. Ephemeral; rebuilt on every
/// scoring pass. Carries the derived attributes the similarity function
/// needs so selection never re-reads the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub property_id: String,
    pub relevance: f64,
    pub factors: FactorScores,
    pub penalties: f64,
    /// Top justification strings, ordered by factor importance, capped at 3.
    pub reasons: Vec<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address_zip: Option<String>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub price: Option<f64>,
    pub price_per_unit: Option<f64>,
    pub units: Option<i32>,
    pub vintage: Option<i32>,
    pub property_type: Option<String>,
}

pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Robust closeness of `x` to `center` on a `spread` scale.
pub fn closeness(x: f64, center: f64, spread: f64) -> f64 {
    clamp01(1.0 - (x - center).abs() / spread.max(1.0))
}

struct UnitsEstimate {
    units: Option<i32>,
    penalty: f64,
    reason: Option<String>,
}

pub struct RelevanceScorer {
    params: ScoringParams,
    reference_year: i32,
}

impl RelevanceScorer {
    pub fn new(params: ScoringParams) -> anyhow::Result<Self> {
        params.validate()?;
        let reference_year = chrono::Datelike::year(&chrono::Utc::now().date_naive());
        Ok(Self {
            params,
            reference_year,
        })
    }

    /// Pins the year used for property-age math. Test hook.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// Scores one property against a buy box under the given market
    /// statistics. Pure; safe to run in parallel across candidates.
    pub fn score(
        &self,
        property: &Property,
        buy_box: &BuyBox,
        stats: &MarketStatistics,
    ) -> ScoredCandidate {
        let p = &self.params;
        // (factor weight, reason); sorted by weight before truncation so the
        // most important factors explain the pick.
        let mut reasons: Vec<(f64, String)> = Vec::new();

        let price = property.price_anchor();
        let units_estimate = self.estimate_units(property);
        let units = units_estimate.units;
        if let Some(reason) = units_estimate.reason {
            reasons.push((p.weight_units, reason));
        }
        let price_per_unit = match (price, units) {
            (Some(price), Some(units)) if units > 0 => Some(price / units as f64),
            _ => None,
        };

        let price_fit = self.price_fit(price, price_per_unit, buy_box, stats, &mut reasons);
        let units_fit = self.units_fit(units, buy_box, &mut reasons);
        let vintage_fit = self.vintage_fit(property.year_built, buy_box, &mut reasons);
        let deal_signals = self.deal_signals(property, price, &mut reasons);
        let on_market_fit = self.on_market_fit(property, &mut reasons);
        let owner_profile_fit = self.owner_profile_fit(property, &mut reasons);

        let factors = FactorScores {
            price_fit,
            units_fit,
            vintage_fit,
            deal_signals,
            on_market_fit,
            owner_profile_fit,
        };

        let weighted = p.weight_price * price_fit
            + p.weight_units * units_fit
            + p.weight_vintage * vintage_fit
            + p.weight_deal_signals * deal_signals
            + p.weight_on_market * on_market_fit
            + p.weight_owner_profile * owner_profile_fit;

        let penalties = units_estimate.penalty;
        let relevance = clamp01(weighted - penalties);

        reasons.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let reasons = reasons.into_iter().take(3).map(|(_, r)| r).collect();

        ScoredCandidate {
            property_id: property.property_id.clone(),
            relevance,
            factors,
            penalties,
            reasons,
            latitude: property.latitude,
            longitude: property.longitude,
            address_zip: property.address_zip.clone(),
            address_city: property.address_city.clone(),
            address_state: property.address_state.clone(),
            price,
            price_per_unit,
            units,
            vintage: property.year_built,
            property_type: property.property_type.clone(),
        }
    }

    fn estimate_units(&self, property: &Property) -> UnitsEstimate {
        if let Some(n) = property.units_count {
            if n > 0 {
                return UnitsEstimate {
                    units: Some(n),
                    penalty: 0.0,
                    reason: None,
                };
            }
        }

        let sqft = property.square_feet.unwrap_or(0.0);
        if property.is_multifamily_type() && sqft > 0.0 {
            let estimated = ((sqft / self.params.sqft_per_unit).round() as i32).max(2);
            return UnitsEstimate {
                units: Some(estimated),
                penalty: self.params.estimated_units_penalty,
                reason: Some(format!("Estimated {estimated} units from {sqft:.0} sq ft")),
            };
        }

        UnitsEstimate {
            units: None,
            penalty: self.params.missing_units_penalty,
            reason: Some("Unit count unavailable".to_string()),
        }
    }

    fn price_fit(
        &self,
        price: Option<f64>,
        price_per_unit: Option<f64>,
        buy_box: &BuyBox,
        stats: &MarketStatistics,
        reasons: &mut Vec<(f64, String)>,
    ) -> f64 {
        let p = &self.params;
        let (Some(price), Some((lo, hi))) = (price, buy_box.price_range()) else {
            return p.neutral_price_fit;
        };

        let mid = (lo + hi) / 2.0;
        if price >= lo && price <= hi {
            let mut fit = closeness(price, mid, (hi - lo) / 2.0);
            if let Some(ppu) = price_per_unit {
                let spread = if stats.price_per_unit_iqr > 0.0 {
                    stats.price_per_unit_iqr
                } else {
                    stats.price_per_unit_median * 0.5
                };
                let ppu_fit = closeness(ppu, stats.price_per_unit_median, spread);
                // Blend total price fit with per-unit fit against the market.
                fit = 0.6 * fit + 0.4 * ppu_fit;
                reasons.push((
                    p.weight_price,
                    format!(
                        "${:.0}/unit vs ${:.0} market median",
                        ppu, stats.price_per_unit_median
                    ),
                ));
            }
            fit
        } else {
            let fit = p.out_of_range_price_damping * closeness(price, mid, hi - lo);
            if price < lo {
                reasons.push((
                    p.weight_price,
                    "Below target price range - potential value play".to_string(),
                ));
            } else {
                reasons.push((
                    p.weight_price,
                    "Above target price range - premium property".to_string(),
                ));
            }
            fit
        }
    }

    fn units_fit(
        &self,
        units: Option<i32>,
        buy_box: &BuyBox,
        reasons: &mut Vec<(f64, String)>,
    ) -> f64 {
        let p = &self.params;
        match (units, buy_box.units_range()) {
            (Some(units), Some((lo, hi))) => {
                if units >= lo && units <= hi {
                    let mid = f64::from(lo + hi) / 2.0;
                    reasons.push((
                        p.weight_units,
                        format!("{units} units in {lo}-{hi} target range"),
                    ));
                    closeness(f64::from(units), mid, f64::from(hi - lo) / 2.0)
                } else if units >= 2 {
                    let side = if units < lo {
                        "smaller than target but manageable"
                    } else {
                        "larger scale opportunity"
                    };
                    reasons.push((p.weight_units, format!("{units} units - {side}")));
                    p.out_of_range_units_multifamily
                } else {
                    reasons.push((
                        p.weight_units,
                        "Single-family property - outside multifamily focus".to_string(),
                    ));
                    p.out_of_range_units_single
                }
            }
            (Some(units), None) if units >= 2 => {
                reasons.push((p.weight_units, format!("{units}-unit multifamily property")));
                p.unbounded_multifamily_units_fit
            }
            _ => p.neutral_units_fit,
        }
    }

    fn vintage_fit(
        &self,
        year_built: Option<i32>,
        buy_box: &BuyBox,
        reasons: &mut Vec<(f64, String)>,
    ) -> f64 {
        let p = &self.params;
        let Some(year) = year_built else {
            return p.neutral_vintage_fit;
        };

        let mut fit = match buy_box.year_range() {
            Some((lo, hi)) if year >= lo && year <= hi => {
                let mid = f64::from(lo + hi) / 2.0;
                closeness(f64::from(year), mid, f64::from(hi - lo) / 2.0)
            }
            Some(_) => {
                // Out-of-range partial credit scaled by age: very old stock
                // scores low, near-new stock scores high.
                let age = self.reference_year - year;
                if age > 100 {
                    0.2
                } else if age < 5 {
                    0.8
                } else {
                    0.5
                }
            }
            None => p.neutral_vintage_fit,
        };

        if year >= p.vintage_bonus_from && year <= p.vintage_bonus_to {
            fit = (fit * p.vintage_bonus_multiplier).min(1.0);
            reasons.push((
                p.weight_vintage,
                format!("{year} built - good rehab/maintenance balance"),
            ));
        } else if year > p.vintage_bonus_to {
            reasons.push((p.weight_vintage, format!("{year} built - modern construction")));
        } else {
            reasons.push((p.weight_vintage, format!("{year} built - character property")));
        }

        fit
    }

    fn deal_signals(
        &self,
        property: &Property,
        price: Option<f64>,
        reasons: &mut Vec<(f64, String)>,
    ) -> f64 {
        let p = &self.params;
        let distress_count = property.distress_flag_count();
        // Two or more concurrent distress flags saturate the signal.
        let distress_fit = clamp01(f64::from(distress_count) / 2.0);

        let years_owned = property.years_owned.unwrap_or(0.0);
        let tenure_fit = clamp01(years_owned / 10.0);

        let equity_fit = match price {
            Some(price) if price > 0.0 => {
                clamp01(property.estimated_equity.unwrap_or(0.0) / price)
            }
            _ => 0.0,
        };

        if distress_count > 0 {
            let mut kinds = Vec::new();
            if property.pre_foreclosure {
                kinds.push("pre-foreclosure");
            }
            if property.auction {
                kinds.push("auction");
            }
            if property.reo {
                kinds.push("REO");
            }
            if property.tax_lien {
                kinds.push("tax lien");
            }
            reasons.push((
                p.weight_deal_signals,
                format!("Distressed: {}", kinds.join(", ")),
            ));
        }
        if years_owned >= 7.0 {
            reasons.push((
                p.weight_deal_signals,
                format!("{years_owned:.0} years owned - potential seller motivation"),
            ));
        }
        if let (Some(equity), Some(price)) = (property.estimated_equity, price) {
            if price > 0.0 && equity / price > 0.4 {
                reasons.push((
                    p.weight_deal_signals,
                    format!(
                        "{:.0}% equity - refinancing opportunity",
                        equity / price * 100.0
                    ),
                ));
            }
        }

        clamp01(0.5 * distress_fit + 0.3 * tenure_fit + 0.2 * equity_fit)
    }

    fn on_market_fit(&self, property: &Property, reasons: &mut Vec<(f64, String)>) -> f64 {
        if property.is_on_market() {
            reasons.push((
                self.params.weight_on_market,
                "Currently for sale - immediate opportunity".to_string(),
            ));
            1.0
        } else {
            0.5
        }
    }

    fn owner_profile_fit(&self, property: &Property, reasons: &mut Vec<(f64, String)>) -> f64 {
        let absentee = if property.is_absentee_owned() { 1.0 } else { 0.6 };
        let corporate = if property.corporate_owned { 0.8 } else { 1.0 };

        if property.out_of_state_absentee_owner {
            reasons.push((
                self.params.weight_owner_profile,
                "Out-of-state owner - motivated seller".to_string(),
            ));
        } else if property.in_state_absentee_owner {
            reasons.push((
                self.params.weight_owner_profile,
                "Absentee owner - investor property".to_string(),
            ));
        }

        clamp01(0.7 * absentee + 0.3 * corporate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::new(ScoringParams::default())
            .unwrap()
            .with_reference_year(2026)
    }

    fn buy_box() -> BuyBox {
        BuyBox {
            market_key: "austin_tx".to_string(),
            markets: vec!["Austin, TX".to_string()],
            price_min: Some(200_000.0),
            price_max: Some(400_000.0),
            units_min: Some(10),
            units_max: Some(30),
            year_min: Some(1970),
            year_max: Some(2000),
        }
    }

    fn market_stats() -> MarketStatistics {
        MarketStatistics {
            market_key: "austin_tx".to_string(),
            price_per_unit_median: 15_000.0,
            price_per_unit_iqr: 5_000.0,
            units_median: 20.0,
            units_iqr: 15.0,
            vintage_median: 1985.0,
            vintage_iqr: 20.0,
            geo_diversity_scale_km: 5.0,
            sample_size: 100,
            computed_at: None,
        }
    }

    fn property(id: &str) -> Property {
        Property {
            property_id: id.to_string(),
            address_city: Some("Austin".to_string()),
            address_state: Some("TX".to_string()),
            address_zip: Some("78701".to_string()),
            latitude: Some(30.27),
            longitude: Some(-97.74),
            property_type: Some("Multifamily".to_string()),
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
    fn rejects_weights_not_summing_to_one() {
        let params = ScoringParams {
            weight_price: 0.5,
            ..Default::default()
        };
        assert!(RelevanceScorer::new(params).is_err());
    }

    #[test]
    fn all_scores_stay_in_unit_interval() {
        let s = scorer();
        let bb = buy_box();
        let stats = market_stats();

        let mut extreme = property("extreme");
        extreme.listing_price = Some(50_000_000.0);
        extreme.units_count = Some(1);
        extreme.year_built = Some(1901);
        extreme.estimated_equity = Some(100_000_000.0);
        extreme.years_owned = Some(80.0);
        extreme.pre_foreclosure = true;
        extreme.auction = true;
        extreme.reo = true;
        extreme.tax_lien = true;
        extreme.mls_active = true;
        extreme.out_of_state_absentee_owner = true;
        extreme.corporate_owned = true;

        for p in [property("bare"), extreme] {
            let scored = s.score(&p, &bb, &stats);
            assert!((0.0..=1.0).contains(&scored.relevance), "{}", scored.relevance);
            for f in [
                scored.factors.price_fit,
                scored.factors.units_fit,
                scored.factors.vintage_fit,
                scored.factors.deal_signals,
                scored.factors.on_market_fit,
                scored.factors.owner_profile_fit,
            ] {
                assert!((0.0..=1.0).contains(&f), "{f}");
            }
            assert!(scored.reasons.len() <= 3);
        }
    }

    #[test]
    fn midpoint_property_maxes_price_units_vintage() {
        let s = scorer();
        let bb = buy_box();
        // Per-unit price equal to the market median so the blend stays 1.0.
        let mut stats = market_stats();
        stats.price_per_unit_median = 300_000.0 / 20.0;

        let mut p = property("mid");
        p.listing_price = Some(300_000.0);
        p.units_count = Some(20);
        p.year_built = Some(1985);

        let scored = s.score(&p, &bb, &stats);
        assert!((scored.factors.price_fit - 1.0).abs() < 1e-9);
        assert!((scored.factors.units_fit - 1.0).abs() < 1e-9);
        // 1985 is inside the bonus window; closeness 1.0 stays capped at 1.0.
        assert!((scored.factors.vintage_fit - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_price_anchor_yields_neutral_price_fit() {
        let s = scorer();
        let scored = s.score(&property("anchorless"), &buy_box(), &market_stats());
        assert!((scored.factors.price_fit - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_buy_box_bounds_yield_neutral_sub_scores() {
        let s = scorer();
        let bb = BuyBox {
            market_key: "austin_tx".to_string(),
            ..Default::default()
        };
        let mut p = property("unbounded");
        p.listing_price = Some(300_000.0);
        p.year_built = Some(1960);

        let scored = s.score(&p, &bb, &market_stats());
        assert!((scored.factors.price_fit - 0.5).abs() < 1e-9);
        // Unknown units with no bounds: neutral default.
        assert!((scored.factors.units_fit - 0.6).abs() < 1e-9);
        assert!((scored.factors.vintage_fit - 0.6).abs() < 1e-9);
    }

    #[test]
    fn units_estimated_from_floor_area_for_multifamily() {
        let s = scorer();
        let mut p = property("estimated");
        p.square_feet = Some(9_000.0);
        p.listing_price = Some(300_000.0);

        let scored = s.score(&p, &buy_box(), &market_stats());
        assert_eq!(scored.units, Some(10));
        assert!((scored.penalties - 0.02).abs() < 1e-9);
    }

    #[test]
    fn unknown_units_takes_larger_penalty() {
        let s = scorer();
        let mut p = property("unknown-units");
        p.property_type = Some("Commercial".to_string());

        let scored = s.score(&p, &buy_box(), &market_stats());
        assert_eq!(scored.units, None);
        assert!((scored.penalties - 0.08).abs() < 1e-9);
    }

    #[test]
    fn single_unit_gets_poor_out_of_range_credit() {
        let s = scorer();
        let mut p = property("sfr");
        p.units_count = Some(1);
        let scored = s.score(&p, &buy_box(), &market_stats());
        assert!((scored.factors.units_fit - 0.1).abs() < 1e-9);

        let mut p = property("fourplex");
        p.units_count = Some(4);
        let scored = s.score(&p, &buy_box(), &market_stats());
        assert!((scored.factors.units_fit - 0.4).abs() < 1e-9);
    }

    #[test]
    fn good_fit_weak_signals_lands_upper_middle_band() {
        // $300k, 20 units, 1985 build, 8 years owned, no distress flags:
        // good price/units/vintage fit, weak deal signals.
        let s = scorer();
        let mut p = property("solid");
        p.listing_price = Some(300_000.0);
        p.units_count = Some(20);
        p.year_built = Some(1985);
        p.years_owned = Some(8.0);

        let scored = s.score(&p, &buy_box(), &market_stats());
        // Perfect range fits with zero distress caps out just under 0.8.
        assert!(
            (0.55..=0.8).contains(&scored.relevance),
            "expected upper-middle band, got {}",
            scored.relevance
        );
    }

    #[test]
    fn price_and_units_dominance_over_deal_signals() {
        // A distressed but badly-fitting property must score markedly below
        // a clean good fit.
        let s = scorer();
        let bb = buy_box();
        let stats = market_stats();

        let mut good = property("good");
        good.listing_price = Some(300_000.0);
        good.units_count = Some(20);
        good.year_built = Some(1985);
        good.years_owned = Some(8.0);

        let mut distressed = property("distressed");
        distressed.listing_price = Some(1_000_000.0);
        distressed.units_count = Some(5);
        distressed.year_built = Some(1960);
        distressed.pre_foreclosure = true;

        let good = s.score(&good, &bb, &stats);
        let distressed = s.score(&distressed, &bb, &stats);
        assert!(
            good.relevance > distressed.relevance + 0.1,
            "good={} distressed={}",
            good.relevance,
            distressed.relevance
        );
    }

    #[test]
    fn reasons_are_concrete_and_ranked_by_factor_weight() {
        let s = scorer();
        let mut p = property("reasons");
        p.listing_price = Some(300_000.0);
        p.units_count = Some(20);
        p.year_built = Some(1985);
        p.pre_foreclosure = true;
        p.years_owned = Some(12.0);
        p.mls_active = true;
        p.out_of_state_absentee_owner = true;

        let scored = s.score(&p, &buy_box(), &market_stats());
        assert_eq!(scored.reasons.len(), 3);
        // Price is the heaviest factor, so its per-unit comparison leads.
        assert!(scored.reasons[0].contains("market median"), "{:?}", scored.reasons);
    }
}
