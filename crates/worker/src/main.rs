use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use doorstep_core::domain::batch::RecommendationBatch;
use doorstep_core::lambda::{self, LambdaParams};
use doorstep_core::orchestrator::{BatchStore, EngineConfig, Orchestrator};
use doorstep_core::storage::{self, PgStore};
use doorstep_core::time::week::resolve_week_start;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "doorstep_worker")]
struct Args {
    /// Week to generate batches for (YYYY-MM-DD, any day inside the week).
    /// Defaults to the current ISO week.
    #[arg(long)]
    week_start: Option<String>,

    /// Restrict the run to a single user.
    #[arg(long)]
    user_id: Option<Uuid>,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,
}

/// Batch sink for dry runs: nothing is read or written, every insert
/// "succeeds".
struct NullBatchStore;

#[async_trait::async_trait]
impl BatchStore for NullBatchStore {
    async fn find_batch(
        &self,
        _user_id: Uuid,
        _market_key: &str,
        _week_start: NaiveDate,
    ) -> anyhow::Result<Option<RecommendationBatch>> {
        Ok(None)
    }

    async fn insert_batch(&self, _batch: &RecommendationBatch) -> anyhow::Result<bool> {
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = doorstep_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let started_at = Utc::now();
    let week_start = resolve_week_start(args.week_start.as_deref(), started_at)?;

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    storage::migrate(&pool).await?;

    let store = PgStore::new(pool.clone());
    let buy_boxes = match args.user_id {
        Some(user_id) => storage::buy_boxes::load_buy_boxes_for_user(&pool, user_id).await?,
        None => storage::buy_boxes::load_buy_boxes(&pool).await?,
    };
    tracing::info!(
        %week_start,
        buy_boxes = buy_boxes.len(),
        dry_run = args.dry_run,
        "starting weekly recommendation run"
    );

    let engine_config = engine_config_from_env();
    let lambda_params = LambdaParams::default();
    lambda_params.validate()?;

    let null_store = NullBatchStore;
    let batch_store: &dyn BatchStore = if args.dry_run { &null_store } else { &store };
    let orchestrator = Orchestrator::new(&store, &store, &store, batch_store, engine_config)?;

    let mut users_processed: i32 = 0;
    let mut batches_created: i32 = 0;
    let mut failures: Vec<String> = Vec::new();

    for (user_id, buy_box) in &buy_boxes {
        let market_key = buy_box.market_key.as_str();

        let acquired =
            storage::lock::try_acquire_batch_lock(&pool, *user_id, market_key, week_start)
                .await?;
        if !acquired {
            tracing::warn!(%user_id, market_key, %week_start, "batch lock not acquired; another run in progress");
            continue;
        }

        let result = process_buy_box(
            &pool,
            &orchestrator,
            &lambda_params,
            *user_id,
            buy_box,
            week_start,
            args.dry_run,
        )
        .await;

        let _ =
            storage::lock::release_batch_lock(&pool, *user_id, market_key, week_start).await;

        users_processed += 1;
        match result {
            Ok(created) => {
                if created {
                    batches_created += 1;
                }
            }
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(%user_id, market_key, error = %err, "buy box processing failed");
                failures.push(format!("{user_id}/{market_key}: {err:#}"));
            }
        }
    }

    if !args.dry_run {
        let status = if failures.is_empty() { "success" } else { "partial" };
        let (error, details) = if failures.is_empty() {
            (None, None)
        } else {
            (
                Some(format!("{} buy box(es) failed", failures.len())),
                Some(serde_json::json!({ "failures": failures })),
            )
        };
        let run_id = storage::runs::record_recommendation_run(
            &pool,
            week_start,
            started_at,
            status,
            error.as_deref(),
            details,
            users_processed,
            batches_created,
        )
        .await?;
        tracing::info!(%run_id, status, users_processed, batches_created, "recommendation run recorded");
    } else {
        tracing::info!(users_processed, batches_created, dry_run = true, "dry run complete");
    }

    Ok(())
}

/// Generates the week's batch for one user x market, then retrains lambda
/// from the recent decision history. Returns whether a batch was newly
/// created (as opposed to an idempotent re-read).
async fn process_buy_box(
    pool: &sqlx::PgPool,
    orchestrator: &Orchestrator<'_>,
    lambda_params: &LambdaParams,
    user_id: Uuid,
    buy_box: &doorstep_core::domain::property::BuyBox,
    week_start: NaiveDate,
    dry_run: bool,
) -> anyhow::Result<bool> {
    let now = Utc::now();
    let market_key = buy_box.market_key.as_str();

    let state = storage::lambda_state::load_lambda_state(pool, user_id, market_key, now).await?;

    let batch = orchestrator
        .generate_weekly_batch(user_id, buy_box, state.lambda, week_start, now)
        .await?;
    let created = batch.generated_at == now;

    tracing::info!(
        %user_id,
        market_key,
        %week_start,
        batch_id = %batch.batch_id,
        entries = batch.entries.len(),
        total_candidates = batch.total_candidates,
        lambda = batch.lambda,
        created,
        "weekly batch ready"
    );

    if dry_run {
        return Ok(created);
    }

    let cutoff = now - chrono::Duration::days(lambda_params.lookback_days);
    let decisions = storage::decisions::recent_decisions(pool, user_id, market_key, cutoff).await?;
    let retrained = lambda::update_lambda(&state, &decisions, lambda_params, now);
    storage::lambda_state::save_lambda_state(pool, &retrained).await?;

    Ok(created)
}

fn engine_config_from_env() -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(k) = env_usize("RECS_PER_BATCH") {
        config.mmr.k = k;
    }
    if let Some(cap) = env_usize("CANDIDATE_POOL_CAP") {
        config.pool.max_pool_size = cap;
    }
    config
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn init_sentry(settings: &doorstep_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
