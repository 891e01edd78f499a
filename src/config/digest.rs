// src/config/digest.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::enhancer::EnhancerSettings;

pub const ENV_DIGEST_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const DEFAULT_DIGEST_CONFIG_PATH: &str = "config/digest.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub sources: SourceSettings,
    #[serde(default)]
    pub enhancer: EnhancerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Simultaneous requests across all adapters.
    pub concurrency: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound of the uniform random jitter added to each backoff.
    pub jitter_ms: u64,
    pub article_timeout_ms: u64,
    pub primary_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_ms: 400,
            article_timeout_ms: 10_000,
            primary_timeout_ms: 15_000,
            user_agent: "nfl-status-digest/0.1 (+personnel status aggregator)".to_string(),
        }
    }
}

impl FetchSettings {
    pub fn article_timeout(&self) -> Duration {
        Duration::from_millis(self.article_timeout_ms)
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub injury_table_url: String,
    pub transactions_feed_url: String,
    pub news_feeds: Vec<String>,
    /// Optional JSON file with extra host → short-name mappings.
    pub directory_path: Option<PathBuf>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            injury_table_url: "https://www.espn.com/nfl/injuries".to_string(),
            transactions_feed_url: "https://profootballtalk.nbcsports.com/category/rumor-mill/feed/"
                .to_string(),
            news_feeds: vec![
                "https://www.espn.com/espn/rss/nfl/news".to_string(),
                "https://www.cbssports.com/rss/headlines/nfl/".to_string(),
                "https://sports.yahoo.com/nfl/rss/".to_string(),
                "https://profootballtalk.nbcsports.com/feed/".to_string(),
            ],
            directory_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_minutes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: 10,
        }
    }
}

/// Optional TOML file overriding the built-in rule table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub rules_path: Option<PathBuf>,
}

impl DigestConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: DigestConfig = toml::from_str(s).context("parsing digest config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $DIGEST_CONFIG_PATH (must exist)
    /// 2) config/digest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_DIGEST_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_DIGEST_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_DIGEST_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from(&default_path);
        }
        Ok(Self::default())
    }

    fn sanitize(&mut self) {
        let f = &mut self.fetch;
        f.concurrency = f.concurrency.max(1);
        f.max_attempts = f.max_attempts.max(1);
        if f.max_delay_ms < f.base_delay_ms {
            std::mem::swap(&mut f.max_delay_ms, &mut f.base_delay_ms);
        }
        self.sources.news_feeds.retain(|u| !u.trim().is_empty());
        self.enhancer.sanitize();
    }
}
