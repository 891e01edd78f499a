// tests/common/mod.rs
//
// Shared fixtures for integration tests: an in-memory `Fetch` that serves
// files from tests/fixtures and counts hits per URL, plus a pipeline builder
// wired exactly like `Aggregator::from_config` minus the network.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nfl_status_digest::classify::Classifier;
use nfl_status_digest::config::DigestConfig;
use nfl_status_digest::enhance::{DisabledEnhancer, DynEnhancer, EnhancerLimits};
use nfl_status_digest::fetch::{Fetch, FetchError};
use nfl_status_digest::ingest::providers::build_registry;
use nfl_status_digest::sources::SourceDirectory;
use nfl_status_digest::Aggregator;

pub const TABLE_URL: &str = "https://www.espn.com/nfl/injuries";
pub const TX_FEED_URL: &str = "https://profootballtalk.nbcsports.com/category/rumor-mill/feed/";
pub const ESPN_FEED_URL: &str = "https://www.espn.com/espn/rss/nfl/news";
pub const AP_FEED_URL: &str = "https://apnews.com/hub/nfl?format=atom";
pub const BROKEN_FEED_URL: &str = "https://feeds.example.com/nfl.xml";

pub const VOLSON_URL: &str =
    "https://profootballtalk.nbcsports.com/2025/08/15/bengals-sign-cordell-volson/";
pub const CHASE_URL: &str = "https://www.espn.com/nfl/story/_/id/1001/bengals-jamarr-chase-hamstring?utm_source=rss&utm_medium=feed";
pub const MCCOLLOUGH_URL: &str = "https://www.espn.com/nfl/story/_/id/1004/rams-sign-jaylen-mccollough";
pub const PRATER_URL: &str = "https://apnews.com/article/matt-prater-retires-0a1b2c";

/// Reference "now" for every fixture scenario: Fri 2025-08-15 12:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap()
}

pub fn fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|e| panic!("read fixture {name}: {e}"))
}

/// Serves registered pages; anything else is a 404.
#[derive(Default)]
pub struct FixtureFetch {
    pages: HashMap<String, String>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FixtureFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn with_file(self, url: &str, name: &str) -> Self {
        let body = fixture(name);
        self.with(url, body)
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetch for FixtureFetch {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Every fixture page the scenario needs. The Witherspoon and Chiefs
/// articles are deliberately missing (404 → snippet fallback).
pub fn fixture_fetch() -> FixtureFetch {
    FixtureFetch::new()
        .with_file(TABLE_URL, "espn_injuries.html")
        .with_file(TX_FEED_URL, "pft_transactions.xml")
        .with_file(VOLSON_URL, "pft_volson.html")
        .with_file(ESPN_FEED_URL, "feed_espn.xml")
        .with_file(AP_FEED_URL, "feed_ap.xml")
        .with_file(CHASE_URL, "article_chase.html")
        .with_file(MCCOLLOUGH_URL, "article_mccollough.html")
        .with_file(PRATER_URL, "article_prater.html")
}

pub fn fixture_config() -> DigestConfig {
    let mut cfg = DigestConfig::default();
    cfg.sources.injury_table_url = TABLE_URL.to_string();
    cfg.sources.transactions_feed_url = TX_FEED_URL.to_string();
    cfg.sources.news_feeds = vec![
        ESPN_FEED_URL.to_string(),
        AP_FEED_URL.to_string(),
        BROKEN_FEED_URL.to_string(),
    ];
    cfg
}

pub fn short_limits() -> EnhancerLimits {
    EnhancerLimits {
        timeout: Duration::from_millis(200),
        ..EnhancerLimits::default()
    }
}

/// Pipeline over `fetch` with the default rule table.
pub fn aggregator_with(fetch: Arc<FixtureFetch>, enhancer: DynEnhancer, budget: u32) -> Aggregator {
    let registry = build_registry(
        &fixture_config(),
        fetch,
        Arc::new(SourceDirectory::default_seed()),
    );
    Aggregator::new(registry, Classifier::default(), enhancer)
        .with_enhancer_limits(short_limits(), budget)
}

pub fn plain_aggregator(fetch: Arc<FixtureFetch>) -> Aggregator {
    aggregator_with(fetch, Arc::new(DisabledEnhancer), 0)
}
