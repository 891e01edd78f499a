// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the
    /// configured cache TTL as a static gauge.
    pub fn init(cache_ttl_minutes: u64) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())?
            .clone();
        ensure_aggregate_metrics();
        gauge!("digest_cache_ttl_minutes").set(cache_ttl_minutes as f64);
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Controller-level series. Fetch, ingest and classify describe their own.
pub(crate) fn ensure_aggregate_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "aggregate_fallbacks_total",
            "Categories that needed the widened lookback pass."
        );
        describe_counter!(
            "aggregate_enhancements_total",
            "Enhancer summarize calls charged against the per-run budget."
        );
        describe_counter!(
            "dedup_removed_total",
            "Items dropped by the URL and entity dedup passes."
        );
        describe_histogram!("aggregate_run_ms", "Wall time of one aggregation run in milliseconds.");
    });
}
