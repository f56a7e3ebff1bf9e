use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The output of one selection run. Created once per user x market x ISO
/// week; entries may later be marked decided but the batch itself is never
/// rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationBatch {
    pub batch_id: Uuid,
    pub user_id: Uuid,
    pub market_key: String,
    pub week_start: NaiveDate,
    pub lambda: f64,
    pub total_candidates: i64,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<BatchEntry>,
}

impl RecommendationBatch {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Selection order, 0-based. Doubles as the display ranking.
    pub position: i32,
    pub property_id: String,
    pub relevance: f64,
    /// 1 - max similarity to the entries selected before this one.
    pub diversity: f64,
    /// The MMR marginal score at selection time.
    pub combined: f64,
    pub reasons: Vec<String>,
    pub decided: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Favorite,
    NotInterested,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Favorite => "favorite",
            Decision::NotInterested => "not_interested",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "favorite" => Some(Decision::Favorite),
            "not_interested" => Some(Decision::NotInterested),
            _ => None,
        }
    }
}

/// Append-only log record of a user acting on a recommendation. Snapshots
/// the scores that produced the recommendation so lambda retraining does not
/// depend on the batch still existing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDecision {
    pub user_id: Uuid,
    pub market_key: String,
    pub property_id: String,
    pub batch_id: Option<Uuid>,
    pub decision: Decision,
    /// True when the property came from an algorithmic batch rather than a
    /// manual save.
    pub from_algorithm: bool,
    pub relevance: Option<f64>,
    pub diversity: Option<f64>,
    pub decided_at: DateTime<Utc>,
}
