// src/aggregate/mod.rs
//! Sparse-retry aggregation controller.
//!
//! Per category: `Base → (sparse) Widened → (optional) Enhanced → Final`.
//! Injury and roster run side by side; breaking runs last and sees what the
//! other two picked so the same fact is not repeated under "breaking".

pub mod run;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, Cache, MemoryCache};
use crate::classify::{Classifier, RuleTable};
use crate::config::DigestConfig;
use crate::dedup::{dedupe_excluding, semantic_pass, SeenKeys};
use crate::enhance::{build_enhancer_from_config, summarize_bounded, DynEnhancer, EnhancerLimits};
use crate::fetch::{Fetch, Fetcher};
use crate::format::finalize;
use crate::ingest::providers::build_registry;
use crate::ingest::{AdapterKind, AdapterRegistry, SourceAdapter};
use crate::metrics::ensure_aggregate_metrics;
use crate::model::{Category, CategorizedResults, CategoryResult, ClassifiedItem, NormalizedArticle};
use crate::sources::SourceDirectory;
pub use run::{AggregationRun, RunLabel};

/// Fewer bullets than this after the base pass triggers the widened pass.
pub const SPARSE_THRESHOLD: usize = 2;

/// Citation given to enhancer bullets that come back without one.
pub const ENHANCED_SOURCE: &str = "Enhanced";

/// Items gathered by one pass over a category's adapters.
#[derive(Debug, Default)]
struct Pass {
    items: Vec<ClassifiedItem>,
    /// Raw `title. text` excerpts carrying the category's vocabulary.
    excerpts: Vec<String>,
}

struct Outcome {
    result: CategoryResult,
    items: Vec<ClassifiedItem>,
}

pub struct Aggregator {
    registry: AdapterRegistry,
    classifier: Classifier,
    enhancer: DynEnhancer,
    limits: EnhancerLimits,
    max_enhancer_calls: u32,
    cache: Option<Arc<dyn Cache>>,
    cache_ttl_minutes: u64,
}

impl Aggregator {
    pub fn new(registry: AdapterRegistry, classifier: Classifier, enhancer: DynEnhancer) -> Self {
        ensure_aggregate_metrics();
        Self {
            registry,
            classifier,
            enhancer,
            limits: EnhancerLimits::default(),
            max_enhancer_calls: 2,
            cache: None,
            cache_ttl_minutes: 0,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>, ttl_minutes: u64) -> Self {
        self.cache = Some(cache);
        self.cache_ttl_minutes = ttl_minutes;
        self
    }

    pub fn with_enhancer_limits(mut self, limits: EnhancerLimits, max_calls_per_run: u32) -> Self {
        self.limits = limits;
        self.max_enhancer_calls = max_calls_per_run;
        self
    }

    /// Wire the whole pipeline from config: fetcher, source directory,
    /// adapters, enhancer and (optionally) the in-memory cache.
    pub fn from_config(cfg: &DigestConfig) -> Result<Self> {
        let fetcher: Arc<dyn Fetch> = Arc::new(Fetcher::new(&cfg.fetch)?);
        let directory = Arc::new(match &cfg.sources.directory_path {
            Some(p) => SourceDirectory::load_from_file(p),
            None => SourceDirectory::default_seed(),
        });
        let registry = build_registry(cfg, fetcher, directory);
        let classifier = match &cfg.classifier.rules_path {
            Some(p) => Classifier::new(RuleTable::load_from(p)?),
            None => Classifier::default(),
        };
        let enhancer = build_enhancer_from_config(&cfg.enhancer);
        let mut agg = Self::new(registry, classifier, enhancer).with_enhancer_limits(
            EnhancerLimits::from(&cfg.enhancer),
            cfg.enhancer.max_calls_per_run,
        );
        if cfg.cache.enabled {
            agg = agg.with_cache(Arc::new(MemoryCache::new()), cfg.cache.ttl_minutes);
        }
        Ok(agg)
    }

    pub fn enhancer(&self) -> &DynEnhancer {
        &self.enhancer
    }

    pub async fn get_categorized_results(
        &self,
        lookback_override: Option<u32>,
        run_label: &str,
    ) -> CategorizedResults {
        self.get_categorized_results_at(Utc::now(), lookback_override, run_label)
            .await
    }

    /// Same as [`Self::get_categorized_results`] with an explicit reference time.
    pub async fn get_categorized_results_at(
        &self,
        now: DateTime<Utc>,
        lookback_override: Option<u32>,
        run_label: &str,
    ) -> CategorizedResults {
        let t0 = Instant::now();
        let label = RunLabel::parse(run_label);
        let base = lookback_override
            .filter(|h| *h > 0)
            .unwrap_or_else(|| label.base_hours());
        let run = AggregationRun::new(label, now, base, self.max_enhancer_calls);

        // 1) injury + roster side by side
        let nothing_seen = SeenKeys::default();
        let (injury, roster) = tokio::join!(
            self.run_category(&run, Category::Injury, &nothing_seen, &[]),
            self.run_category(&run, Category::Roster, &nothing_seen, &[]),
        );

        // 2) breaking, aware of what the other two picked
        let mut seen = SeenKeys::default();
        for item in injury.items.iter().chain(roster.items.iter()) {
            seen.record(item);
        }
        let context: Vec<String> = injury
            .result
            .bullets
            .iter()
            .chain(roster.result.bullets.iter())
            .cloned()
            .collect();
        let breaking = self
            .run_category(&run, Category::Breaking, &seen, &context)
            .await;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("aggregate_run_ms").record(ms);
        let fallbacks_used = run.fallbacks();
        info!(
            target: "aggregate",
            run = %label,
            base_hours = run.base_hours,
            injury = injury.result.bullets.len(),
            roster = roster.result.bullets.len(),
            breaking = breaking.result.bullets.len(),
            fallbacks = fallbacks_used.len(),
            enhancer_budget_left = run.remaining_budget(),
            ms,
            "aggregation run finished"
        );

        CategorizedResults {
            injury: injury.result,
            roster: roster.result,
            breaking: breaking.result,
            fallbacks_used,
        }
    }

    async fn run_category(
        &self,
        run: &AggregationRun,
        category: Category,
        exclude: &SeenKeys,
        other_context: &[String],
    ) -> Outcome {
        // Base
        let mut pass = self.pass(run, category, run.base_hours, exclude).await;
        let mut enhanced: Vec<String> = Vec::new();

        if pass.items.len() < SPARSE_THRESHOLD {
            // Widened: keep the larger result, base wins ties
            let widened_hours = run.widened_hours(category);
            let wide = self.pass(run, category, widened_hours, exclude).await;
            let excerpts = wide.excerpts.clone();
            if wide.items.len() > pass.items.len() {
                pass = wide;
            }
            pass.excerpts = excerpts;
            counter!("aggregate_fallbacks_total", "category" => category.as_str()).increment(1);
            let mut entry = format!(
                "{category}: widened lookback {}h -> {widened_hours}h",
                run.base_hours
            );

            // Enhanced: still sparse, enhancer up, one unit of budget left
            if pass.items.len() < SPARSE_THRESHOLD
                && self.enhancer.is_available()
                && !pass.excerpts.is_empty()
                && run.try_take_budget()
            {
                counter!("aggregate_enhancements_total", "category" => category.as_str())
                    .increment(1);
                let date_iso = run.now.format("%Y-%m-%d").to_string();
                enhanced = summarize_bounded(
                    self.enhancer.as_ref(),
                    self.limits,
                    category,
                    &pass.excerpts,
                    &date_iso,
                    other_context,
                )
                .await;
                if !enhanced.is_empty() {
                    entry.push_str(" + enhancement");
                }
            }
            debug!(target: "aggregate", %category, entry = %entry, "fallback");
            run.record_fallback(category, entry);
        }

        // Final
        let stages = stages_of(category, &pass.items, !enhanced.is_empty());
        // rule bullets always carry their own citation
        let default_source = if enhanced.is_empty() { "" } else { ENHANCED_SOURCE };
        let rule_bullets = pass.items.iter().map(|i| i.fact_bullet.clone());
        let bullets: Vec<String> = if enhanced.is_empty() {
            rule_bullets.collect()
        } else {
            let merged: Vec<String> = enhanced.into_iter().chain(rule_bullets).collect();
            semantic_pass(self.enhancer.as_ref(), self.limits.timeout, merged).await
        };
        Outcome {
            result: finalize(category, &bullets, default_source, &stages),
            items: pass.items,
        }
    }

    /// One pass over the category's adapters at `hours`: classify, then the
    /// mandatory dedup passes.
    async fn pass(
        &self,
        run: &AggregationRun,
        category: Category,
        hours: u32,
        exclude: &SeenKeys,
    ) -> Pass {
        let mut out = Pass::default();
        for &kind in AdapterKind::for_category(category) {
            let Some(adapter) = self.registry.get(kind) else {
                continue;
            };
            let articles = self.articles(run, kind, adapter, hours).await;
            for article in articles.iter() {
                let item = match kind.structured_category() {
                    Some(c) if c == category => {
                        self.classifier.accept_structured(article, category)
                    }
                    Some(_) => None,
                    None => {
                        self.collect_excerpt(category, article, &mut out.excerpts);
                        self.classifier
                            .classify(article)
                            .filter(|it| it.category == category)
                    }
                };
                if let Some(item) = item {
                    out.items.push(item);
                }
            }
        }
        out.items = dedupe_excluding(out.items, exclude);
        out
    }

    fn collect_excerpt(
        &self,
        category: Category,
        article: &NormalizedArticle,
        into: &mut Vec<String>,
    ) {
        let rules = self.classifier.rules();
        if rules.is_excluded(&article.title) {
            return;
        }
        let excerpt = format!("{}. {} ({})", article.title, article.text, article.source);
        if rules.matches(category, &excerpt) && rules.allows(category, &article.domain()) {
            into.push(excerpt);
        }
    }

    /// Adapter output for one window, computed at most once per run and
    /// read through the cache when one is configured. Adapter errors are
    /// logged and count as an empty result.
    async fn articles(
        &self,
        run: &AggregationRun,
        kind: AdapterKind,
        adapter: Arc<dyn SourceAdapter>,
        hours: u32,
    ) -> Vec<NormalizedArticle> {
        let cell = run.memo_cell(kind, hours);
        cell.get_or_init(|| self.load(run, kind, adapter, hours))
            .await
            .clone()
    }

    async fn load(
        &self,
        run: &AggregationRun,
        kind: AdapterKind,
        adapter: Arc<dyn SourceAdapter>,
        hours: u32,
    ) -> Vec<NormalizedArticle> {
        let key = cache_key("adapter", &[kind.stage(), &hours.to_string()]);
        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(raw)) => match serde_json::from_str::<Vec<NormalizedArticle>>(&raw) {
                    Ok(v) => {
                        debug!(target: "aggregate", adapter = kind.stage(), hours, "cache hit");
                        return v;
                    }
                    Err(e) => debug!(target: "aggregate", error = %e, "cache entry unreadable"),
                },
                Ok(None) => {}
                Err(e) => debug!(target: "aggregate", error = %e, "cache read failed"),
            }
        }

        let articles = match adapter.fetch_recent(run.window(hours)).await {
            Ok(v) => v,
            Err(e) => {
                counter!("ingest_adapter_errors_total", "adapter" => kind.stage()).increment(1);
                warn!(
                    target: "aggregate",
                    adapter = adapter.name(),
                    hours,
                    error = %format!("{e:#}"),
                    "adapter failed; treating as empty"
                );
                return Vec::new();
            }
        };

        if let Some(cache) = &self.cache {
            match serde_json::to_string(&articles) {
                Ok(raw) => {
                    if let Err(e) = cache.set(&key, raw, self.cache_ttl_minutes).await {
                        debug!(target: "aggregate", error = %e, "cache write failed");
                    }
                }
                Err(e) => debug!(target: "aggregate", error = %e, "cache entry not serializable"),
            }
        }
        articles
    }
}

/// `table + feed`, `transactions`, `feed + enhancement`, … in pipeline order.
fn stages_of(category: Category, items: &[ClassifiedItem], enhanced: bool) -> String {
    let mut kinds = BTreeSet::new();
    for item in items {
        let kind = match (item.article.bullet.is_some(), category) {
            (true, Category::Injury) => AdapterKind::Table,
            (true, Category::Roster) => AdapterKind::TransactionFeed,
            _ => AdapterKind::FullText,
        };
        kinds.insert(kind);
    }
    let mut parts: Vec<&str> = kinds.into_iter().map(AdapterKind::stage).collect();
    if enhanced {
        parts.push("enhancement");
    }
    parts.join(" + ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityHints;

    fn item(url: &str, bullet: Option<&str>) -> ClassifiedItem {
        ClassifiedItem {
            article: NormalizedArticle {
                canonical_url: url.into(),
                source: "ESPN".into(),
                title: String::new(),
                text: String::new(),
                published_at: Utc::now(),
                hints: EntityHints::default(),
                bullet: bullet.map(str::to_string),
            },
            category: Category::Injury,
            fact_bullet: "x (ESPN)".into(),
            entity: None,
        }
    }

    #[test]
    fn stage_labels_follow_pipeline_order() {
        let items = vec![item("https://a/1", None), item("https://a/2", Some("b"))];
        assert_eq!(stages_of(Category::Injury, &items, false), "table + feed");
        assert_eq!(stages_of(Category::Breaking, &items[..1], true), "feed + enhancement");
        assert_eq!(stages_of(Category::Roster, &[], true), "enhancement");
        assert_eq!(stages_of(Category::Roster, &[], false), "");
    }
}
