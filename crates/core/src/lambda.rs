use crate::domain::batch::{Decision, UserDecision};
use anyhow::ensure;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LAMBDA_DEFAULT: f64 = 0.7;

/// Per user x market relevance/diversity trade-off, read before each batch
/// and rewritten after retraining. Explicit state object, never ambient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaState {
    pub user_id: Uuid,
    pub market_key: String,
    pub lambda: f64,
    pub updated_at: DateTime<Utc>,
}

impl LambdaState {
    pub fn initial(user_id: Uuid, market_key: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            market_key: market_key.to_string(),
            lambda: LAMBDA_DEFAULT,
            updated_at: now,
        }
    }
}

/// Bounded hill-climb parameters. Deliberately not a bandit: per-user
/// decision volume is too low for anything statistically hungrier.
#[derive(Debug, Clone)]
pub struct LambdaParams {
    pub lookback_days: i64,
    /// Fewer accepted decisions than this in the window is a no-op.
    pub min_decisions: usize,
    /// Accepted-from-algorithm ratio above which lambda moves toward
    /// exploration (when diverse picks are being rewarded).
    pub high_accept_ratio: f64,
    /// Ratio below which lambda moves toward exploitation.
    pub low_accept_ratio: f64,
    /// Mean diversity contribution that counts as "rewarding exploration".
    pub high_diversity: f64,
    pub step: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for LambdaParams {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            min_decisions: 3,
            high_accept_ratio: 0.7,
            low_accept_ratio: 0.3,
            high_diversity: 0.6,
            step: 0.1,
            floor: 0.5,
            ceiling: 0.9,
        }
    }
}

impl LambdaParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.lookback_days > 0, "lookback_days must be positive");
        ensure!(self.min_decisions > 0, "min_decisions must be positive");
        ensure!(
            0.0 <= self.floor && self.floor <= self.ceiling && self.ceiling <= 1.0,
            "lambda bounds must satisfy 0 <= floor <= ceiling <= 1 (got {} and {})",
            self.floor,
            self.ceiling
        );
        ensure!(
            self.step > 0.0 && self.step <= self.ceiling - self.floor,
            "step must be positive and fit inside the bounds (got {})",
            self.step
        );
        ensure!(
            self.low_accept_ratio < self.high_accept_ratio,
            "low_accept_ratio must be below high_accept_ratio"
        );
        Ok(())
    }
}

/// Nudges lambda from the recent accept history. Accepting many diverse
/// algorithmic picks rewards exploration (lambda down); accepting few
/// algorithmic picks asks for tighter matches (lambda up). Otherwise the
/// previous value is retained, as it is on insufficient signal.
pub fn update_lambda(
    state: &LambdaState,
    decisions: &[UserDecision],
    params: &LambdaParams,
    now: DateTime<Utc>,
) -> LambdaState {
    let cutoff = now - Duration::days(params.lookback_days);
    let accepted: Vec<&UserDecision> = decisions
        .iter()
        .filter(|d| d.decided_at >= cutoff && d.decision == Decision::Favorite)
        .collect();

    if accepted.len() < params.min_decisions {
        return state.clone();
    }

    let from_algorithm: Vec<&&UserDecision> =
        accepted.iter().filter(|d| d.from_algorithm).collect();
    let accept_ratio = from_algorithm.len() as f64 / accepted.len() as f64;

    let diversity_scores: Vec<f64> = from_algorithm
        .iter()
        .filter_map(|d| d.diversity)
        .collect();
    let mean_diversity = if diversity_scores.is_empty() {
        0.0
    } else {
        diversity_scores.iter().sum::<f64>() / diversity_scores.len() as f64
    };

    let new_lambda = if accept_ratio > params.high_accept_ratio
        && mean_diversity > params.high_diversity
    {
        (state.lambda - params.step).max(params.floor)
    } else if accept_ratio < params.low_accept_ratio {
        (state.lambda + params.step).min(params.ceiling)
    } else {
        state.lambda
    };

    if (new_lambda - state.lambda).abs() > f64::EPSILON {
        tracing::info!(
            user_id = %state.user_id,
            market_key = %state.market_key,
            old_lambda = state.lambda,
            new_lambda,
            accept_ratio,
            mean_diversity,
            "lambda adjusted"
        );
    }

    LambdaState {
        user_id: state.user_id,
        market_key: state.market_key.clone(),
        lambda: new_lambda,
        updated_at: now,
    }
}
