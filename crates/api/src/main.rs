use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use doorstep_core::domain::batch::{Decision, RecommendationBatch, UserDecision};
use doorstep_core::orchestrator::BatchStore;
use doorstep_core::storage::{self, PgStore};
use doorstep_core::time::week::week_start;

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
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState { pool };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/batches/:user_id/:market_key/latest",
            get(get_latest_batch),
        )
        .route(
            "/batches/:user_id/:market_key/:week_start",
            get(get_batch_by_week),
        )
        .route("/decisions", post(post_decision))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
}

async fn get_latest_batch(
    State(state): State<AppState>,
    Path((user_id, market_key)): Path<(Uuid, String)>,
) -> Result<Json<RecommendationBatch>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let week = fetch_latest_week(pool, user_id, &market_key)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let batch = PgStore::new(pool.clone())
        .find_batch(user_id, &market_key, week)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(batch))
}

async fn get_batch_by_week(
    State(state): State<AppState>,
    Path((user_id, market_key, week)): Path<(Uuid, String, String)>,
) -> Result<Json<RecommendationBatch>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    // Any day inside the week addresses that week's batch.
    let week = NaiveDate::parse_from_str(&week, "%Y-%m-%d")
        .map(week_start)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let batch = PgStore::new(pool.clone())
        .find_batch(user_id, &market_key, week)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(batch))
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    user_id: Uuid,
    market_key: String,
    property_id: String,
    batch_id: Option<Uuid>,
    decision: Decision,
}

#[derive(Debug, Serialize)]
struct DecisionResponse {
    decision_id: Uuid,
}

async fn post_decision(
    State(state): State<AppState>,
    Json(req): Json<DecisionRequest>,
) -> Result<(StatusCode, Json<DecisionResponse>), StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    // Snapshot the entry's scores so lambda retraining sees them even after
    // the batch ages out.
    let scores = match req.batch_id {
        Some(batch_id) => fetch_entry_scores(pool, batch_id, &req.property_id)
            .await
            .map_err(|e| {
                sentry_anyhow::capture_anyhow(&e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?,
        None => None,
    };

    let decision = UserDecision {
        user_id: req.user_id,
        market_key: req.market_key,
        property_id: req.property_id,
        batch_id: req.batch_id,
        decision: req.decision,
        from_algorithm: req.batch_id.is_some(),
        relevance: scores.map(|(r, _)| r),
        diversity: scores.map(|(_, d)| d),
        decided_at: Utc::now(),
    };

    let decision_id = storage::decisions::record_decision(pool, &decision)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::CREATED, Json(DecisionResponse { decision_id })))
}

async fn fetch_latest_week(
    pool: &PgPool,
    user_id: Uuid,
    market_key: &str,
) -> anyhow::Result<Option<NaiveDate>> {
    let row: Option<(NaiveDate,)> = sqlx::query_as(
        "SELECT week_start FROM recommendation_batches \
         WHERE user_id = $1 AND market_key = $2 \
         ORDER BY week_start DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .bind(market_key)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(week,)| week))
}

async fn fetch_entry_scores(
    pool: &PgPool,
    batch_id: Uuid,
    property_id: &str,
) -> anyhow::Result<Option<(f64, f64)>> {
    let row: Option<(f64, f64)> = sqlx::query_as(
        "SELECT relevance, diversity FROM recommendation_entries \
         WHERE batch_id = $1 AND property_id = $2 \
         LIMIT 1",
    )
    .bind(batch_id)
    .bind(property_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
