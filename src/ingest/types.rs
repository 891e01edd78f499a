// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::{Category, NormalizedArticle};

/// Time span an item's publish/update time must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub hours: u32,
    /// Reference "now" for the whole aggregation run.
    pub now: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn new(hours: u32, now: DateTime<Utc>) -> Self {
        Self { hours, now }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.now - Duration::hours(i64::from(self.hours))
    }

    /// Inside `[now - hours, now]`. Slightly future timestamps (clock skew
    /// between sources) are accepted up to 10 minutes.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start() && ts <= self.now + Duration::minutes(10)
    }
}

/// Source classes known at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdapterKind {
    /// Structured injury table; rows arrive with finished bullets.
    Table,
    /// Transactions feed; items arrive with finished bullets.
    TransactionFeed,
    /// Generic full-text feeds; raw material for the classifier.
    FullText,
}

impl AdapterKind {
    /// Stage name used in `CategoryResult::source`.
    pub fn stage(self) -> &'static str {
        match self {
            AdapterKind::Table => "table",
            AdapterKind::TransactionFeed => "transactions",
            AdapterKind::FullText => "feed",
        }
    }

    /// Category a structured adapter feeds directly, `None` for raw text.
    pub fn structured_category(self) -> Option<Category> {
        match self {
            AdapterKind::Table => Some(Category::Injury),
            AdapterKind::TransactionFeed => Some(Category::Roster),
            AdapterKind::FullText => None,
        }
    }

    /// Adapters consulted for a category, structured sources first.
    pub fn for_category(category: Category) -> &'static [AdapterKind] {
        match category {
            Category::Injury => &[AdapterKind::Table, AdapterKind::FullText],
            Category::Roster => &[AdapterKind::TransactionFeed, AdapterKind::FullText],
            Category::Breaking => &[AdapterKind::FullText],
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage())
    }
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Articles updated/published inside `window`. Per-item failures are
    /// skipped inside the adapter; `Err` means the primary endpoint failed.
    async fn fetch_recent(&self, window: LookbackWindow) -> Result<Vec<NormalizedArticle>>;
    fn name(&self) -> &'static str;
}

/// Adapter implementations resolved once at startup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<AdapterKind, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: AdapterKind, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.insert(kind, adapter);
        self
    }

    pub fn insert(&mut self, kind: AdapterKind, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    pub fn get(&self, kind: AdapterKind) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<AdapterKind> {
        let mut v: Vec<_> = self.adapters.keys().copied().collect();
        v.sort();
        v
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self
            .kinds()
            .into_iter()
            .filter_map(|k| self.adapters.get(&k).map(|a| (k, a.name())))
            .collect();
        f.debug_struct("AdapterRegistry")
            .field("adapters", &names)
            .finish()
    }
}
