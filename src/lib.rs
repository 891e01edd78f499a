// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod enhance;
pub mod fetch;
pub mod format;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{Aggregator, RunLabel};
pub use crate::api::router;
pub use crate::model::{CategorizedResults, Category, CategoryResult};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "DIGEST_LOG_JSON";

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter; `DIGEST_LOG_JSON=1` switches to JSON lines. Safe to call twice.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nfl_status_digest=info,warn"));
    let json = std::env::var(ENV_LOG_JSON).is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
