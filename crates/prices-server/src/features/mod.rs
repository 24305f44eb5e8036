//! Feature modules implementing the prices API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes. Commands and queries implement the mediator pattern using the
//! `mediator` crate, keeping write and read paths separated.
//!
//! # Features
//!
//! - **prices**: bulk CSV-in-zip ingest, full-table export, aggregate totals

pub mod prices;

use axum::Router;

/// Shared state for all feature routes
///
/// Carries the process-wide database pool and the ingest policy knobs that
/// are injected into route handlers.
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for database operations
    pub db: sqlx::PgPool,
    /// Ingest behavior (strict vs. soft row failures)
    pub ingest: crate::config::IngestConfig,
}

/// Creates the API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().merge(prices::prices_routes().with_state(state))
}
