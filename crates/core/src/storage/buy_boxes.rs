use crate::domain::property::BuyBox;
use anyhow::Context;
use uuid::Uuid;

type BuyBoxRow = (
    Uuid,
    String,
    Vec<String>,
    Option<f64>,
    Option<f64>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
);

fn into_buy_box(row: BuyBoxRow) -> (Uuid, BuyBox) {
    let (user_id, market_key, markets, price_min, price_max, units_min, units_max, year_min, year_max) =
        row;
    (
        user_id,
        BuyBox {
            market_key,
            markets,
            price_min,
            price_max,
            units_min,
            units_max,
            year_min,
            year_max,
        },
    )
}

/// All configured buy boxes, the worker's work list. Ordered for stable
/// processing and log output.
pub async fn load_buy_boxes(pool: &sqlx::PgPool) -> anyhow::Result<Vec<(Uuid, BuyBox)>> {
    let rows: Vec<BuyBoxRow> = sqlx::query_as(
        "SELECT user_id, market_key, markets, price_min, price_max, \
                units_min, units_max, year_min, year_max \
         FROM buy_boxes ORDER BY user_id, market_key",
    )
    .persistent(false)
    .fetch_all(pool)
    .await
    .context("select buy_boxes failed")?;
    Ok(rows.into_iter().map(into_buy_box).collect())
}

pub async fn load_buy_boxes_for_user(
    pool: &sqlx::PgPool,
    user_id: Uuid,
) -> anyhow::Result<Vec<(Uuid, BuyBox)>> {
    let rows: Vec<BuyBoxRow> = sqlx::query_as(
        "SELECT user_id, market_key, markets, price_min, price_max, \
                units_min, units_max, year_min, year_max \
         FROM buy_boxes WHERE user_id = $1 ORDER BY market_key",
    )
    .persistent(false)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("select buy_boxes failed")?;
    Ok(rows.into_iter().map(into_buy_box).collect())
}
