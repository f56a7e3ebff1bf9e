use anyhow::Context;

pub mod batches;
pub mod buy_boxes;
pub mod decisions;
pub mod inventory;
pub mod lambda_state;
pub mod lock;
pub mod market_stats;
pub mod runs;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Postgres-backed implementation of the core's data-access traits.
#[derive(Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}
