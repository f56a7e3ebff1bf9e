use crate::domain::batch::{BatchEntry, RecommendationBatch};
use crate::domain::property::BuyBox;
use crate::mmr::{self, MmrConfig};
use crate::pool::{self, Inventory, PoolConfig, RecommendationHistory};
use crate::scoring::{RelevanceScorer, ScoringParams};
use crate::stats::{StatsParams, StatsProvider, StatsStore};
use anyhow::ensure;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Persistence boundary for recommendation batches. Writes must be
/// all-or-nothing: a cancelled run may never leave a partial batch visible.
#[async_trait::async_trait]
pub trait BatchStore: Send + Sync {
    async fn find_batch(
        &self,
        user_id: Uuid,
        market_key: &str,
        week_start: NaiveDate,
    ) -> anyhow::Result<Option<RecommendationBatch>>;

    /// Atomically inserts the batch. Returns false when a batch already
    /// exists for the same (user, market, week) key, in which case nothing
    /// is written.
    async fn insert_batch(&self, batch: &RecommendationBatch) -> anyhow::Result<bool>;
}

/// All engine tunables in one place, validated together at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mmr: MmrConfig,
    pub pool: PoolConfig,
    pub scoring: ScoringParams,
    pub stats: StatsParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mmr: MmrConfig {
                k: 9,
                lambda: crate::lambda::LAMBDA_DEFAULT,
                max_per_postal: 2,
                weights: Default::default(),
            },
            pool: PoolConfig::default(),
            scoring: ScoringParams::default(),
            stats: StatsParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.mmr.validate()?;
        self.pool.validate()?;
        self.scoring.validate()?;
        Ok(())
    }
}

pub struct Orchestrator<'a> {
    inventory: &'a dyn Inventory,
    history: &'a dyn RecommendationHistory,
    stats_store: &'a dyn StatsStore,
    batch_store: &'a dyn BatchStore,
    scorer: RelevanceScorer,
    config: EngineConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        inventory: &'a dyn Inventory,
        history: &'a dyn RecommendationHistory,
        stats_store: &'a dyn StatsStore,
        batch_store: &'a dyn BatchStore,
        config: EngineConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let scorer = RelevanceScorer::new(config.scoring.clone())?;
        Ok(Self {
            inventory,
            history,
            stats_store,
            batch_store,
            scorer,
            config,
        })
    }

    /// Generates (or returns) the batch for one user x market x ISO week.
    /// Safe under at-least-once invocation: an existing batch for the key
    /// short-circuits, and a losing concurrent writer reads the winner's
    /// batch instead of erroring.
    pub async fn generate_weekly_batch(
        &self,
        user_id: Uuid,
        buy_box: &BuyBox,
        lambda: f64,
        week_start: NaiveDate,
        now: DateTime<Utc>,
    ) -> anyhow::Result<RecommendationBatch> {
        ensure!(
            (0.0..=1.0).contains(&lambda),
            "lambda must be in [0,1] (got {lambda})"
        );

        if let Some(existing) = self
            .batch_store
            .find_batch(user_id, &buy_box.market_key, week_start)
            .await?
        {
            tracing::debug!(
                %user_id,
                market_key = %buy_box.market_key,
                %week_start,
                batch_id = %existing.batch_id,
                "batch already exists for this week"
            );
            return Ok(existing);
        }

        let candidates = pool::build_pool(
            self.inventory,
            self.history,
            user_id,
            buy_box,
            &self.config.pool,
            now,
        )
        .await;
        let total_candidates = candidates.len() as i64;

        if candidates.is_empty() {
            // Persist an explicit empty batch so "no eligible inventory" is
            // distinguishable from "not yet run".
            let batch = RecommendationBatch {
                batch_id: Uuid::new_v4(),
                user_id,
                market_key: buy_box.market_key.clone(),
                week_start,
                lambda,
                total_candidates: 0,
                generated_at: now,
                entries: Vec::new(),
            };
            return self.commit(batch).await;
        }

        let stats = StatsProvider::new(self.stats_store, self.inventory)
            .with_params(self.config.stats.clone())
            .get_statistics(&buy_box.market_key, &buy_box.markets, now)
            .await;

        // Scoring is pure per candidate; a plain loop is enough at pool-cap
        // sizes.
        let scored: Vec<_> = candidates
            .iter()
            .map(|p| self.scorer.score(p, buy_box, &stats))
            .collect();

        let mmr_config = MmrConfig {
            lambda,
            ..self.config.mmr.clone()
        };
        let selections = mmr::select(scored, &mmr_config, &stats);

        let entries: Vec<BatchEntry> = selections
            .into_iter()
            .enumerate()
            .map(|(position, s)| BatchEntry {
                position: position as i32,
                property_id: s.candidate.property_id,
                relevance: s.candidate.relevance,
                diversity: s.diversity,
                combined: s.combined,
                reasons: s.candidate.reasons,
                decided: false,
            })
            .collect();

        let batch = RecommendationBatch {
            batch_id: Uuid::new_v4(),
            user_id,
            market_key: buy_box.market_key.clone(),
            week_start,
            lambda,
            total_candidates,
            generated_at: now,
            entries,
        };
        self.commit(batch).await
    }

    async fn commit(
        &self,
        batch: RecommendationBatch,
    ) -> anyhow::Result<RecommendationBatch> {
        if self.batch_store.insert_batch(&batch).await? {
            tracing::info!(
                user_id = %batch.user_id,
                market_key = %batch.market_key,
                week_start = %batch.week_start,
                batch_id = %batch.batch_id,
                entries = batch.entries.len(),
                total_candidates = batch.total_candidates,
                "recommendation batch persisted"
            );
            return Ok(batch);
        }

        // Lost an insert race: the other writer's batch is the batch.
        let existing = self
            .batch_store
            .find_batch(batch.user_id, &batch.market_key, batch.week_start)
            .await?;
        existing.ok_or_else(|| {
            anyhow::anyhow!(
                "batch insert conflicted but no batch found for user={} market={} week={}",
                batch.user_id,
                batch.market_key,
                batch.week_start
            )
        })
    }
}
