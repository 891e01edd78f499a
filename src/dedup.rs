// src/dedup.rs
//! Multi-key deduplication of classified items.
//!
//! Mandatory passes over recency-sorted items: canonical URL, then
//! `EntityKey`, first occurrence wins. The optional semantic pass hands bullet
//! strings to the enhancer and only accepts an answer that is a non-empty
//! subset-sized list; anything else leaves the input as is.

use std::collections::HashSet;
use std::time::Duration;

use metrics::counter;
use tracing::debug;

use crate::enhance::{semantic_dedupe_bounded, Enhancer};
use crate::model::{ClassifiedItem, EntityKey};

/// Newest first; ties broken by canonical URL so output order does not depend
/// on fetch completion order.
pub fn sort_by_recency(items: &mut [ClassifiedItem]) {
    items.sort_by(|a, b| {
        b.article
            .published_at
            .cmp(&a.article.published_at)
            .then_with(|| a.article.canonical_url.cmp(&b.article.canonical_url))
    });
}

/// Keys already taken by other categories (or earlier passes) of this run.
#[derive(Debug, Default, Clone)]
pub struct SeenKeys {
    pub urls: HashSet<String>,
    pub entities: HashSet<EntityKey>,
}

impl SeenKeys {
    pub fn record(&mut self, item: &ClassifiedItem) {
        self.urls.insert(item.article.canonical_url.clone());
        if let Some(e) = &item.entity {
            self.entities.insert(e.clone());
        }
    }

    pub fn contains(&self, item: &ClassifiedItem) -> bool {
        self.urls.contains(&item.article.canonical_url)
            || item
                .entity
                .as_ref()
                .is_some_and(|e| self.entities.contains(e))
    }
}

/// Sort + URL pass + entity pass. Idempotent.
pub fn dedupe(items: Vec<ClassifiedItem>) -> Vec<ClassifiedItem> {
    dedupe_excluding(items, &SeenKeys::default())
}

/// Like [`dedupe`], additionally dropping anything already in `exclude`.
pub fn dedupe_excluding(mut items: Vec<ClassifiedItem>, exclude: &SeenKeys) -> Vec<ClassifiedItem> {
    sort_by_recency(&mut items);
    let before = items.len();

    let mut seen_urls: HashSet<String> = HashSet::new();
    let by_url: Vec<ClassifiedItem> = items
        .into_iter()
        .filter(|it| !exclude.urls.contains(&it.article.canonical_url))
        .filter(|it| seen_urls.insert(it.article.canonical_url.clone()))
        .collect();

    let mut seen_entities: HashSet<EntityKey> = HashSet::new();
    let out: Vec<ClassifiedItem> = by_url
        .into_iter()
        .filter(|it| match &it.entity {
            Some(e) => !exclude.entities.contains(e) && seen_entities.insert(e.clone()),
            None => true,
        })
        .collect();

    let removed = before - out.len();
    if removed > 0 {
        counter!("dedup_removed_total").increment(removed as u64);
        debug!(target: "aggregate", before, after = out.len(), "dedup");
    }
    out
}

/// Optional semantic pass. The enhancer's answer replaces `bullets` only when
/// it is non-empty and not longer than the input.
pub async fn semantic_pass(
    enhancer: &dyn Enhancer,
    timeout: Duration,
    bullets: Vec<String>,
) -> Vec<String> {
    if bullets.len() < 2 || !enhancer.is_available() {
        return bullets;
    }
    let merged = semantic_dedupe_bounded(enhancer, timeout, &bullets).await;
    if merged.is_empty() || merged.len() > bullets.len() {
        debug!(
            target: "aggregate",
            returned = merged.len(),
            input = bullets.len(),
            "semantic dedupe answer ignored"
        );
        return bullets;
    }
    merged
}
