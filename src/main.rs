//! NFL Status Digest — Binary Entrypoint
//! Boots the Axum HTTP server: config, aggregator, `/digest`, `/metrics`.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::info;

use nfl_status_digest::api::{self, AppState};
use nfl_status_digest::config::DigestConfig;
use nfl_status_digest::metrics::Metrics;
use nfl_status_digest::{init_tracing, Aggregator};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = DigestConfig::load_default().context("loading digest config")?;
    let metrics = Metrics::init(cfg.cache.ttl_minutes).context("installing metrics recorder")?;
    let aggregator = Aggregator::from_config(&cfg).context("building aggregator")?;
    info!(
        feeds = cfg.sources.news_feeds.len(),
        enhancer = aggregator.enhancer().provider_name(),
        "digest service ready"
    );

    let router = api::router(AppState::new(aggregator)).merge(metrics.router());
    Ok(router.into())
}
