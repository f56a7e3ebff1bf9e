use crate::scoring::{clamp01, ScoredCandidate};
use crate::stats::MarketStatistics;
use anyhow::ensure;
use std::collections::HashMap;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Component weights for the blended candidate-to-candidate similarity.
/// Equal weighting is the default; the split is a tuning parameter, not a
/// derived quantity.
#[derive(Debug, Clone)]
pub struct SimilarityWeights {
    pub geographic: f64,
    pub price_per_unit: f64,
    pub vintage: f64,
    pub property_type: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            geographic: 0.25,
            price_per_unit: 0.25,
            vintage: 0.25,
            property_type: 0.25,
        }
    }
}

impl SimilarityWeights {
    pub fn validate(&self) -> anyhow::Result<()> {
        let weights = [
            self.geographic,
            self.price_per_unit,
            self.vintage,
            self.property_type,
        ];
        for w in weights {
            ensure!((0.0..=1.0).contains(&w), "similarity weight out of [0,1]: {w}");
        }
        let sum: f64 = weights.iter().sum();
        ensure!(
            (sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE,
            "similarity weights must sum to 1.0 (got {sum})"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MmrConfig {
    /// Number of candidates to select.
    pub k: usize,
    /// Relevance/diversity trade-off: 1.0 is pure relevance ranking, 0.0 is
    /// maximal spread.
    pub lambda: f64,
    /// Frequency cap per postal code within one batch.
    pub max_per_postal: usize,
    pub weights: SimilarityWeights,
}

impl MmrConfig {
    pub fn new(k: usize, lambda: f64) -> anyhow::Result<Self> {
        let cfg = Self {
            k,
            lambda,
            max_per_postal: 2,
            weights: SimilarityWeights::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.k > 0, "k must be positive (got {})", self.k);
        ensure!(
            (0.0..=1.0).contains(&self.lambda),
            "lambda must be in [0,1] (got {})",
            self.lambda
        );
        ensure!(
            self.max_per_postal >= 1,
            "max_per_postal must be >= 1 (got {})",
            self.max_per_postal
        );
        self.weights.validate()
    }
}

/// One selected candidate with its diversity bookkeeping.
#[derive(Debug, Clone)]
pub struct Selection {
    pub candidate: ScoredCandidate,
    /// 1 - max similarity to previously selected candidates (1.0 for the
    /// first pick).
    pub diversity: f64,
    /// The marginal score that won the selection round.
    pub combined: f64,
}

const EARTH_RADIUS_KM: f64 = 6371.0;

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

fn decay(delta: f64, scale: f64) -> f64 {
    (-delta.abs() / scale.max(1.0)).exp()
}

fn geographic_similarity(a: &ScoredCandidate, b: &ScoredCandidate, geo_scale_km: f64) -> f64 {
    if let (Some(az), Some(bz)) = (a.address_zip.as_deref(), b.address_zip.as_deref()) {
        if az == bz {
            return 1.0;
        }
    }
    if let (Some(alat), Some(alon), Some(blat), Some(blon)) =
        (a.latitude, a.longitude, b.latitude, b.longitude)
    {
        let km = haversine_km(alat, alon, blat, blon);
        return decay(km, geo_scale_km);
    }
    if let (Some(ac), Some(astate), Some(bc), Some(bstate)) = (
        a.address_city.as_deref(),
        a.address_state.as_deref(),
        b.address_city.as_deref(),
        b.address_state.as_deref(),
    ) {
        if ac.eq_ignore_ascii_case(bc) && astate.eq_ignore_ascii_case(bstate) {
            return 0.7;
        }
    }
    // No usable location signal: assume mostly dissimilar.
    0.2
}

/// Coarse multifamily classes for partial type matches.
fn normalize_property_type(property_type: &str) -> &'static str {
    let t = property_type.to_lowercase();
    if t.contains("duplex") || t.contains("triplex") || t.contains("fourplex") {
        "small_multifamily"
    } else if t.contains("apartment") || t.contains("complex") {
        "apartment"
    } else if t.contains("condo") || t.contains("townhouse") {
        "condo_townhouse"
    } else {
        "multifamily"
    }
}

fn type_similarity(a: &ScoredCandidate, b: &ScoredCandidate) -> f64 {
    match (a.property_type.as_deref(), b.property_type.as_deref()) {
        (Some(at), Some(bt)) => {
            if at.eq_ignore_ascii_case(bt) {
                1.0
            } else if normalize_property_type(at) == normalize_property_type(bt) {
                0.8
            } else {
                0.4
            }
        }
        _ => 0.7,
    }
}

/// Blended similarity in [0,1] across geography, price-per-unit, vintage,
/// and property type. Distances are scaled by the market's IQRs.
pub fn similarity(
    a: &ScoredCandidate,
    b: &ScoredCandidate,
    stats: &MarketStatistics,
    weights: &SimilarityWeights,
) -> f64 {
    let geo = geographic_similarity(a, b, stats.geo_diversity_scale_km);

    let ppu = match (a.price_per_unit, b.price_per_unit) {
        (Some(ap), Some(bp)) => decay(ap - bp, stats.price_per_unit_iqr),
        _ => 0.5,
    };

    let vintage = match (a.vintage, b.vintage) {
        (Some(av), Some(bv)) => decay(f64::from(av - bv), stats.vintage_iqr),
        _ => 0.6,
    };

    let kind = type_similarity(a, b);

    clamp01(
        weights.geographic * geo
            + weights.price_per_unit * ppu
            + weights.vintage * vintage
            + weights.property_type * kind,
    )
}

/// Greedy Maximal Marginal Relevance selection. Returns at most
/// min(k, candidates) selections in selection order; order doubles as the
/// display ranking.
pub fn select(
    candidates: Vec<ScoredCandidate>,
    cfg: &MmrConfig,
    stats: &MarketStatistics,
) -> Vec<Selection> {
    let mut remaining = candidates;
    let mut selected: Vec<Selection> = Vec::with_capacity(cfg.k.min(remaining.len()));
    let mut postal_counts: HashMap<String, usize> = HashMap::new();

    while selected.len() < cfg.k && !remaining.is_empty() {
        let mut best: Option<(usize, f64, f64)> = None; // (index, marginal, max_sim)

        for (idx, candidate) in remaining.iter().enumerate() {
            if let Some(zip) = candidate.address_zip.as_deref() {
                if postal_counts.get(zip).copied().unwrap_or(0) >= cfg.max_per_postal {
                    continue;
                }
            }

            let max_sim = selected
                .iter()
                .map(|s| similarity(candidate, &s.candidate, stats, &cfg.weights))
                .fold(0.0_f64, f64::max);

            let marginal = if selected.is_empty() {
                candidate.relevance
            } else {
                cfg.lambda * candidate.relevance - (1.0 - cfg.lambda) * max_sim
            };

            let is_better = match &best {
                None => true,
                Some((best_idx, best_marginal, _)) => {
                    let incumbent = &remaining[*best_idx];
                    match marginal.partial_cmp(best_marginal) {
                        Some(std::cmp::Ordering::Greater) => true,
                        Some(std::cmp::Ordering::Less) | None => false,
                        Some(std::cmp::Ordering::Equal) => {
                            // Ties: higher relevance, then lower id.
                            match candidate.relevance.partial_cmp(&incumbent.relevance) {
                                Some(std::cmp::Ordering::Greater) => true,
                                Some(std::cmp::Ordering::Less) | None => false,
                                Some(std::cmp::Ordering::Equal) => {
                                    candidate.property_id < incumbent.property_id
                                }
                            }
                        }
                    }
                }
            };
            if is_better {
                best = Some((idx, marginal, max_sim));
            }
        }

        // Every remaining candidate is postal-capped.
        let Some((idx, marginal, max_sim)) = best else {
            break;
        };

        let candidate = remaining.swap_remove(idx);
        if let Some(zip) = candidate.address_zip.as_deref() {
            *postal_counts.entry(zip.to_string()).or_insert(0) += 1;
        }
        selected.push(Selection {
            diversity: 1.0 - max_sim,
            combined: marginal,
            candidate,
        });
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::FactorScores;

    fn candidate(id: &str, relevance: f64) -> ScoredCandidate {
        ScoredCandidate {
            property_id: id.to_string(),
            relevance,
            factors: FactorScores {
                price_fit: relevance,
                units_fit: relevance,
                vintage_fit: relevance,
                deal_signals: relevance,
                on_market_fit: relevance,
                owner_profile_fit: relevance,
            },
            penalties: 0.0,
            reasons: vec![],
            latitude: None,
            longitude: None,
            address_zip: None,
            address_city: None,
            address_state: None,
            price: None,
            price_per_unit: None,
            units: None,
            vintage: None,
            property_type: None,
        }
    }

    fn stats() -> MarketStatistics {
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

    #[test]
    fn config_rejects_bad_parameters() {
        assert!(MmrConfig::new(0, 0.7).is_err());
        assert!(MmrConfig::new(9, 1.2).is_err());
        assert!(MmrConfig::new(9, -0.1).is_err());
        let mut cfg = MmrConfig::new(9, 0.7).unwrap();
        cfg.weights.geographic = 0.9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lambda_one_is_pure_relevance_ranking() {
        let cfg = MmrConfig::new(3, 1.0).unwrap();
        let candidates = vec![
            candidate("a", 0.2),
            candidate("b", 0.9),
            candidate("c", 0.5),
            candidate("d", 0.7),
        ];
        let out = select(candidates, &cfg, &stats());
        let ids: Vec<&str> = out.iter().map(|s| s.candidate.property_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c"]);
    }

    #[test]
    fn lambda_zero_spreads_away_from_near_duplicates() {
        let cfg = MmrConfig::new(2, 0.0).unwrap();
        let mut twin_a = candidate("twin-a", 0.9);
        let mut twin_b = candidate("twin-b", 0.85);
        let mut far = candidate("far", 0.3);
        for (c, zip, ppu, vintage) in [
            (&mut twin_a, "78701", 15_000.0, 1985),
            (&mut twin_b, "78701", 15_050.0, 1985),
            (&mut far, "78999", 40_000.0, 1962),
        ] {
            c.address_zip = Some(zip.to_string());
            c.price_per_unit = Some(ppu);
            c.vintage = Some(vintage);
            c.property_type = Some("Apartment".to_string());
        }
        // twin-a and twin-b share a postal code and nearly everything else.
        assert!(similarity(&twin_a, &twin_b, &stats(), &cfg.weights) > 0.95);

        let out = select(vec![twin_a, twin_b, far], &cfg, &stats());
        let ids: Vec<&str> = out.iter().map(|s| s.candidate.property_id.as_str()).collect();
        assert_eq!(ids, vec!["twin-a", "far"]);
    }

    #[test]
    fn never_returns_duplicates_or_more_than_min_k_n() {
        let cfg = MmrConfig::new(10, 0.7).unwrap();
        let candidates = vec![candidate("a", 0.4), candidate("b", 0.6)];
        let out = select(candidates, &cfg, &stats());
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].candidate.property_id, out[1].candidate.property_id);
    }

    #[test]
    fn ties_break_by_relevance_then_id() {
        let cfg = MmrConfig::new(2, 1.0).unwrap();
        let out = select(
            vec![candidate("z", 0.5), candidate("a", 0.5), candidate("m", 0.5)],
            &cfg,
            &stats(),
        );
        let ids: Vec<&str> = out.iter().map(|s| s.candidate.property_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m"]);
    }

    #[test]
    fn postal_frequency_cap_is_enforced() {
        let cfg = MmrConfig::new(4, 1.0).unwrap();
        let mut candidates = Vec::new();
        for (id, rel) in [("a", 0.9), ("b", 0.8), ("c", 0.7)] {
            let mut c = candidate(id, rel);
            c.address_zip = Some("78701".to_string());
            candidates.push(c);
        }
        let mut other = candidate("d", 0.1);
        other.address_zip = Some("78702".to_string());
        candidates.push(other);

        let out = select(candidates, &cfg, &stats());
        let in_cap = out
            .iter()
            .filter(|s| s.candidate.address_zip.as_deref() == Some("78701"))
            .count();
        assert_eq!(in_cap, 2);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn first_pick_has_full_diversity_credit() {
        let cfg = MmrConfig::new(2, 0.7).unwrap();
        let out = select(vec![candidate("a", 0.9), candidate("b", 0.5)], &cfg, &stats());
        assert!((out[0].diversity - 1.0).abs() < 1e-9);
        assert!((out[0].combined - 0.9).abs() < 1e-9);
    }
}
