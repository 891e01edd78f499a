// src/ingest/providers/mod.rs
//! Concrete source adapters and the registry factory.

pub mod fulltext;
pub mod table;
pub mod transactions;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::DigestConfig;
use crate::fetch::{Fetch, FetchError};
use crate::ingest::types::{AdapterKind, AdapterRegistry};
use crate::sources::SourceDirectory;

pub use fulltext::FullTextAdapter;
pub use table::InjuryTableAdapter;
pub use transactions::TransactionsAdapter;

/// Registry with one adapter per configured source class. A source with an
/// empty URL (or no news feeds) is simply not registered.
pub fn build_registry(
    cfg: &DigestConfig,
    fetcher: Arc<dyn Fetch>,
    directory: Arc<SourceDirectory>,
) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    let primary = cfg.fetch.primary_timeout();
    let article = cfg.fetch.article_timeout();

    if !cfg.sources.injury_table_url.trim().is_empty() {
        registry.insert(
            AdapterKind::Table,
            Arc::new(InjuryTableAdapter::new(
                fetcher.clone(),
                cfg.sources.injury_table_url.clone(),
                primary,
                directory.clone(),
            )),
        );
    }
    if !cfg.sources.transactions_feed_url.trim().is_empty() {
        registry.insert(
            AdapterKind::TransactionFeed,
            Arc::new(TransactionsAdapter::new(
                fetcher.clone(),
                cfg.sources.transactions_feed_url.clone(),
                primary,
                article,
                directory.clone(),
            )),
        );
    }
    if !cfg.sources.news_feeds.is_empty() {
        registry.insert(
            AdapterKind::FullText,
            Arc::new(FullTextAdapter::new(
                fetcher,
                cfg.sources.news_feeds.clone(),
                primary,
                article,
                directory,
            )),
        );
    }
    tracing::info!(target: "ingest", adapters = ?registry, "adapter registry built");
    registry
}

/// Fetch `urls` concurrently; the fetcher's semaphore bounds how many are in
/// flight. Results come back keyed by URL, in no particular order.
pub(crate) async fn fetch_all(
    fetcher: &Arc<dyn Fetch>,
    urls: Vec<String>,
    timeout: Duration,
) -> HashMap<String, Result<String, FetchError>> {
    let mut set = JoinSet::new();
    for url in urls {
        let f = fetcher.clone();
        set.spawn(async move {
            let res = f.fetch(&url, timeout).await;
            (url, res)
        });
    }
    let mut out = HashMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((url, res)) => {
                out.insert(url, res);
            }
            Err(e) => tracing::warn!(target: "ingest", error = %e, "fetch task failed"),
        }
    }
    out
}
