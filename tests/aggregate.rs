// tests/aggregate.rs
//
// End-to-end aggregation over recorded pages and stub adapters:
// sparse retry, enhancer budget and failure modes, per-run memoization,
// category caps and cross-category exclusion.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use nfl_status_digest::aggregate::ENHANCED_SOURCE;
use nfl_status_digest::cache::MemoryCache;
use nfl_status_digest::classify::Classifier;
use nfl_status_digest::enhance::{DisabledEnhancer, Enhancer, MockEnhancer};
use nfl_status_digest::ingest::{AdapterKind, AdapterRegistry, LookbackWindow, SourceAdapter};
use nfl_status_digest::model::{Category, EntityHints, NormalizedArticle};
use nfl_status_digest::Aggregator;

use common::*;

const ENHANCED: &str = "Titans name Cam Ward the starting quarterback for Week 1 (ESPN)";

// ------------------------------------------------------------
// Stubs
// ------------------------------------------------------------

/// Returns the same articles for every window; optionally fails.
struct StubAdapter {
    articles: Vec<NormalizedArticle>,
    fail: bool,
}

impl StubAdapter {
    fn ok(articles: Vec<NormalizedArticle>) -> Arc<Self> {
        Arc::new(Self {
            articles,
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            articles: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    async fn fetch_recent(&self, window: LookbackWindow) -> anyhow::Result<Vec<NormalizedArticle>> {
        if self.fail {
            anyhow::bail!("stub source unavailable");
        }
        Ok(self
            .articles
            .iter()
            .filter(|a| window.contains(a.published_at))
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Never answers within any sane timeout.
struct SlowEnhancer;

#[async_trait]
impl Enhancer for SlowEnhancer {
    async fn summarize(
        &self,
        _category: Category,
        _excerpts: &[String],
        _date_iso: &str,
        _other_context: &[String],
    ) -> Vec<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        vec![ENHANCED.to_string()]
    }

    async fn semantic_dedupe(&self, bullets: &[String]) -> Vec<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        bullets.to_vec()
    }

    fn provider_name(&self) -> &'static str {
        "slow"
    }
}

fn article(
    url: &str,
    title: &str,
    text: &str,
    published_at: DateTime<Utc>,
    person: Option<&str>,
    team: Option<&str>,
) -> NormalizedArticle {
    NormalizedArticle {
        canonical_url: url.to_string(),
        source: "ESPN".to_string(),
        title: title.to_string(),
        text: text.to_string(),
        published_at,
        hints: EntityHints {
            person: person.map(str::to_string),
            team: team.map(str::to_string),
        },
        bullet: None,
    }
}

fn table_row(i: usize, published_at: DateTime<Utc>) -> NormalizedArticle {
    let name = format!("Player Number{i}");
    let mut a = article(
        &format!("https://espn.com/nfl/injuries#player-{i}"),
        &name,
        "",
        published_at,
        Some(&name),
        Some("LAR"),
    );
    a.bullet = Some(format!(
        "{name} (LAR) \u{2014} Out (knee) \u{b7} Updated Aug 15 (ESPN)"
    ));
    a
}

// ------------------------------------------------------------
// Fixture scenario
// ------------------------------------------------------------

#[tokio::test]
async fn sparse_categories_widen_and_record_fallbacks() {
    let fetch = Arc::new(fixture_fetch());
    let agg = plain_aggregator(fetch.clone());

    let out = agg.get_categorized_results_at(now(), None, "morning").await;

    // injury: 1 row at 12h → widened to 48h picks up table rows + Chase story
    assert_eq!(out.injury.total_count, 4, "{:#?}", out.injury);
    assert_eq!(out.injury.overflow, 0);
    assert_eq!(out.injury.source, "table + feed");
    assert!(out.injury.bullets[0].starts_with("\u{1F195} Puka Nacua (LAR)"));
    assert_eq!(
        out.injury.bullets[1],
        "Matthew Stafford (LAR) \u{2014} Limited (back issue) \u{b7} Updated Aug 14 (ESPN)"
    );
    assert!(out.injury.bullets[2].contains("Chase"), "{}", out.injury.bullets[2]);
    assert!(out.injury.bullets[3].starts_with("Trey Hendrickson (CIN)"));

    // roster: Volson + McCollough is enough, no widening
    assert_eq!(out.roster.total_count, 2, "{:#?}", out.roster);
    assert_eq!(out.roster.source, "transactions + feed");
    assert!(out.roster.bullets[0].contains("Cordell Volson"));
    assert!(out.roster.bullets[1].contains("McCollough"));

    // breaking: only the Prater story, even at 24h
    assert_eq!(out.breaking.total_count, 1, "{:#?}", out.breaking);
    assert_eq!(out.breaking.source, "feed");
    assert!(out.breaking.bullets[0].contains("Prater"));
    assert!(out.breaking.bullets[0].ends_with("(AP)"));

    assert_eq!(
        out.fallbacks_used,
        vec![
            "injury: widened lookback 12h -> 48h".to_string(),
            "breaking: widened lookback 12h -> 24h".to_string(),
        ]
    );

    // every bullet carries a citation
    for cat in Category::ALL {
        for b in &out.get(cat).bullets {
            assert!(b.ends_with(')'), "uncited bullet: {b}");
        }
    }
}

#[tokio::test]
async fn adapter_output_is_shared_across_categories_within_a_run() {
    let fetch = Arc::new(fixture_fetch());
    let agg = plain_aggregator(fetch.clone());

    let _ = agg.get_categorized_results_at(now(), None, "morning").await;

    // news feeds: 12h (shared by all three), 48h (injury), 24h (breaking)
    assert_eq!(fetch.hits(ESPN_FEED_URL), 3);
    assert_eq!(fetch.hits(AP_FEED_URL), 3);
    // table: 12h + 48h; transactions: 12h only
    assert_eq!(fetch.hits(TABLE_URL), 2);
    assert_eq!(fetch.hits(TX_FEED_URL), 1);
}

#[tokio::test]
async fn cache_serves_repeat_runs_without_refetching() {
    let fetch = Arc::new(fixture_fetch());
    let agg = plain_aggregator(fetch.clone()).with_cache(Arc::new(MemoryCache::new()), 10);

    let first = agg.get_categorized_results_at(now(), None, "morning").await;
    let second = agg.get_categorized_results_at(now(), None, "morning").await;

    assert_eq!(first, second);
    assert_eq!(fetch.hits(ESPN_FEED_URL), 3);
    assert_eq!(fetch.hits(TABLE_URL), 2);
}

#[tokio::test]
async fn explicit_lookback_replaces_the_run_default() {
    let agg = plain_aggregator(Arc::new(fixture_fetch()));
    let out = agg.get_categorized_results_at(now(), Some(48), "evening").await;

    // 48h base already holds four injury rows → no injury fallback
    assert_eq!(out.injury.total_count, 4);
    assert!(out
        .fallbacks_used
        .iter()
        .all(|f| !f.starts_with("injury:")));
    // breaking widens to at least twice the base
    assert!(out
        .fallbacks_used
        .contains(&"breaking: widened lookback 48h -> 96h".to_string()));
}

#[tokio::test]
async fn failed_primary_source_falls_back_to_feeds() {
    // no injury table page: the adapter errors, the run carries on
    let fetch = FixtureFetch::new()
        .with_file(TX_FEED_URL, "pft_transactions.xml")
        .with_file(ESPN_FEED_URL, "feed_espn.xml")
        .with_file(CHASE_URL, "article_chase.html");
    let agg = plain_aggregator(Arc::new(fetch));

    let out = agg.get_categorized_results_at(now(), None, "morning").await;
    assert_eq!(out.injury.total_count, 1);
    assert_eq!(out.injury.source, "feed");
    assert!(out.injury.bullets[0].contains("Chase"));
}

// ------------------------------------------------------------
// Enhancer
// ------------------------------------------------------------

#[tokio::test]
async fn enhancer_fills_a_sparse_category_within_budget() {
    let mock = Arc::new(MockEnhancer::new(vec![ENHANCED.to_string()]));
    let agg = aggregator_with(Arc::new(fixture_fetch()), mock.clone(), 2);

    let out = agg.get_categorized_results_at(now(), None, "morning").await;

    assert_eq!(mock.summarize_calls(), 1, "only breaking is still sparse");
    assert_eq!(out.breaking.bullets[0], ENHANCED);
    assert!(out.breaking.bullets.iter().any(|b| b.contains("Prater")));
    assert_eq!(out.breaking.source, "feed + enhancement");
    assert_eq!(
        out.fallbacks_used.last().map(String::as_str),
        Some("breaking: widened lookback 12h -> 24h + enhancement")
    );
}

#[tokio::test]
async fn uncited_enhancer_bullets_are_attributed_to_the_enhancer() {
    let mock = Arc::new(MockEnhancer::new(vec![
        "Titans name Cam Ward the starting quarterback for Week 1".to_string(),
    ]));
    let agg = aggregator_with(Arc::new(fixture_fetch()), mock.clone(), 2);

    let out = agg.get_categorized_results_at(now(), None, "morning").await;

    assert_eq!(mock.summarize_calls(), 1);
    assert_eq!(
        out.breaking.bullets[0],
        format!("Titans name Cam Ward the starting quarterback for Week 1 ({ENHANCED_SOURCE})")
    );
    assert!(out.breaking.bullets.iter().all(|b| !b.ends_with("(Unknown)")));
    // rule bullets keep their own citation
    assert!(out
        .breaking
        .bullets
        .iter()
        .any(|b| b.contains("Prater") && b.ends_with("(AP)")));
}

#[tokio::test]
async fn zero_budget_never_calls_the_enhancer() {
    let mock = Arc::new(MockEnhancer::new(vec![ENHANCED.to_string()]));
    let agg = aggregator_with(Arc::new(fixture_fetch()), mock.clone(), 0);

    let out = agg.get_categorized_results_at(now(), None, "morning").await;

    assert_eq!(mock.summarize_calls(), 0);
    assert_eq!(out.breaking.source, "feed");
    assert!(out.fallbacks_used.iter().all(|f| !f.contains("enhancement")));
}

#[tokio::test]
async fn slow_enhancer_is_cut_off_and_rule_bullets_survive() {
    let agg = aggregator_with(Arc::new(fixture_fetch()), Arc::new(SlowEnhancer), 2);

    let started = std::time::Instant::now();
    let out = agg.get_categorized_results_at(now(), None, "morning").await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(out.breaking.total_count, 1);
    assert!(out.breaking.bullets[0].contains("Prater"));
    assert_eq!(out.breaking.source, "feed");
    assert_eq!(
        out.fallbacks_used.last().map(String::as_str),
        Some("breaking: widened lookback 12h -> 24h")
    );
}

#[tokio::test]
async fn budget_is_shared_by_every_category_of_a_run() {
    let t = now() - ChronoDuration::hours(1);
    let feed = StubAdapter::ok(vec![
        article(
            "https://espn.com/nfl/story/_/id/2001/bucs-evans-hamstring",
            "Buccaneers WR Mike Evans hurts hamstring",
            "Tampa Bay Buccaneers receiver Mike Evans suffered a hamstring injury in practice on Friday.",
            t,
            Some("Mike Evans"),
            Some("TB"),
        ),
        article(
            "https://apnews.com/article/ravens-coordinator-hired",
            "Ravens hire offensive coordinator",
            "The Baltimore Ravens hired Todd Monken as offensive coordinator on Friday, the team announced.",
            t,
            None,
            Some("BAL"),
        ),
    ]);
    let registry = AdapterRegistry::new().with(AdapterKind::FullText, feed);
    let mock = Arc::new(MockEnhancer::new(vec![ENHANCED.to_string()]));
    let agg = Aggregator::new(registry, Classifier::default(), mock.clone())
        .with_enhancer_limits(short_limits(), 1);

    let out = agg.get_categorized_results_at(now(), None, "morning").await;

    // injury runs before breaking and takes the single unit
    assert_eq!(mock.summarize_calls(), 1);
    assert_eq!(out.injury.source, "feed + enhancement");
    assert_eq!(out.breaking.source, "feed");
    let enhanced: Vec<_> = out
        .fallbacks_used
        .iter()
        .filter(|f| f.ends_with("+ enhancement"))
        .collect();
    assert_eq!(enhanced.len(), 1);
    assert!(enhanced[0].starts_with("injury:"));
}

#[tokio::test]
async fn disabled_enhancer_leaves_sparse_categories_sparse() {
    let agg = aggregator_with(Arc::new(fixture_fetch()), Arc::new(DisabledEnhancer), 5);
    let out = agg.get_categorized_results_at(now(), None, "morning").await;
    assert_eq!(out.breaking.total_count, 1);
    assert!(out.fallbacks_used.iter().all(|f| !f.contains("enhancement")));
}

// ------------------------------------------------------------
// Caps, empties and exclusion
// ------------------------------------------------------------

#[tokio::test]
async fn category_cap_reports_overflow() {
    let rows: Vec<_> = (0..25)
        .map(|i| table_row(i, now() - ChronoDuration::minutes(i as i64)))
        .collect();
    let registry = AdapterRegistry::new().with(AdapterKind::Table, StubAdapter::ok(rows));
    let agg = Aggregator::new(registry, Classifier::default(), Arc::new(DisabledEnhancer));

    let out = agg.get_categorized_results_at(now(), None, "morning").await;

    assert_eq!(out.injury.total_count, 25);
    assert_eq!(out.injury.bullets.len(), Category::Injury.cap());
    assert_eq!(out.injury.overflow, 5);
    assert_eq!(out.injury.source, "table");
    // newest first
    assert!(out.injury.bullets[0].starts_with("Player Number0 (LAR)"));

    // nothing anywhere else: empty results, both widened
    assert_eq!(out.roster.total_count, 0);
    assert_eq!(out.roster.source, "None");
    assert!(out.roster.bullets.is_empty());
    assert_eq!(out.breaking.source, "None");
    assert_eq!(
        out.fallbacks_used,
        vec![
            "roster: widened lookback 12h -> 48h".to_string(),
            "breaking: widened lookback 12h -> 24h".to_string(),
        ]
    );
}

#[tokio::test]
async fn failing_adapters_yield_empty_results_not_errors() {
    let registry = AdapterRegistry::new()
        .with(AdapterKind::Table, StubAdapter::failing())
        .with(AdapterKind::TransactionFeed, StubAdapter::failing())
        .with(AdapterKind::FullText, StubAdapter::failing());
    let agg = Aggregator::new(registry, Classifier::default(), Arc::new(DisabledEnhancer));

    let out = agg.get_categorized_results_at(now(), None, "afternoon").await;
    for cat in Category::ALL {
        assert_eq!(out.get(cat).total_count, 0);
        assert_eq!(out.get(cat).source, "None");
    }
    assert_eq!(out.fallbacks_used.len(), 3);
    assert_eq!(out.fallbacks_used[0], "injury: widened lookback 6h -> 24h");
}

#[tokio::test]
async fn breaking_skips_people_already_reported_elsewhere() {
    let t = now() - ChronoDuration::hours(1);
    let mut row = table_row(0, t);
    row.hints.person = Some("Matt Prater".to_string());
    row.hints.team = Some("ARI".to_string());
    row.bullet = Some("Matt Prater (ARI) \u{2014} Out (retired) \u{b7} Updated Aug 15 (ESPN)".into());

    let news = article(
        "https://apnews.com/article/prater-retires",
        "Kicker Matt Prater retires",
        "Veteran kicker Matt Prater announced his retirement on Friday after 18 seasons in the league.",
        t,
        Some("Matt Prater"),
        Some("ARI"),
    );

    // without the table row the story is breaking news
    let only_news =
        AdapterRegistry::new().with(AdapterKind::FullText, StubAdapter::ok(vec![news.clone()]));
    let agg = Aggregator::new(only_news, Classifier::default(), Arc::new(DisabledEnhancer));
    let out = agg.get_categorized_results_at(now(), None, "morning").await;
    assert_eq!(out.breaking.total_count, 1, "{:#?}", out.breaking);

    // with it, the same person is not repeated under breaking
    let both = AdapterRegistry::new()
        .with(AdapterKind::Table, StubAdapter::ok(vec![row]))
        .with(AdapterKind::FullText, StubAdapter::ok(vec![news]));
    let agg = Aggregator::new(both, Classifier::default(), Arc::new(DisabledEnhancer));
    let out = agg.get_categorized_results_at(now(), None, "morning").await;
    assert_eq!(out.injury.total_count, 1);
    assert_eq!(out.breaking.total_count, 0, "{:#?}", out.breaking);
}
