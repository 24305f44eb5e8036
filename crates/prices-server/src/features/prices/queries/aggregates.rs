//! Cumulative aggregate totals
//!
//! The table is the sole source of truth for totals: they are always
//! computed by querying it, never by summing an in-memory batch.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Query for the standalone aggregates endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAggregatesQuery;

/// The three cumulative statistics over the entire table.
///
/// Serializes to the upload response body:
/// `{"total_items": .., "total_categories": .., "total_price": ..}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct Aggregates {
    pub total_items: i64,
    pub total_categories: i64,
    pub total_price: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum GetAggregatesError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Aggregates, GetAggregatesError>> for GetAggregatesQuery {}

/// Compute the totals over the entire `prices` table.
///
/// Generic over the executor so it runs against the open transaction during
/// ingest and against the pool for the read endpoint. An empty table yields
/// a zero price sum, never NULL.
pub async fn fetch_aggregates<'e, E>(executor: E) -> Result<Aggregates, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query_as::<_, Aggregates>(
        r#"
        SELECT COUNT(*) AS total_items,
               COUNT(DISTINCT category) AS total_categories,
               COALESCE(SUM(price), 0)::double precision AS total_price
        FROM prices
        "#,
    )
    .fetch_one(executor)
    .await
}

pub async fn handle(
    pool: PgPool,
    _query: GetAggregatesQuery,
) -> Result<Aggregates, GetAggregatesError> {
    Ok(fetch_aggregates(&pool).await?)
}
