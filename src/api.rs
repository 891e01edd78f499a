// src/api.rs
use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::aggregate::Aggregator;
use crate::model::CategorizedResults;

/// Lookback overrides above this are clamped (the staleness ceiling would
/// drop anything older anyway).
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 30;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/digest", get(digest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct DigestQuery {
    /// `morning` | `afternoon` (`midday`) | `evening`; anything else is morning.
    #[serde(default)]
    pub run: Option<String>,
    /// Base lookback in hours; `0` or missing uses the run label's default.
    #[serde(default)]
    pub lookback: Option<u32>,
}

async fn digest(
    State(state): State<AppState>,
    Query(q): Query<DigestQuery>,
) -> Json<CategorizedResults> {
    let run = q.run.as_deref().unwrap_or("morning");
    let lookback = q
        .lookback
        .filter(|h| *h > 0)
        .map(|h| h.min(MAX_LOOKBACK_HOURS));
    info!(target: "aggregate", run, ?lookback, "digest requested");
    Json(state.aggregator.get_categorized_results(lookback, run).await)
}
