// src/ingest/providers/fulltext.rs
//! Generic full-text feeds: the shared raw material for the classifier.
//!
//! Feeds are polled concurrently, items are screened (window, list-style
//! titles, stale explicit dates), bodies are fetched concurrently and cleaned.
//! Nothing here classifies or formats.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::fetch_all;
use crate::classify::entities::hints_for;
use crate::fetch::Fetch;
use crate::ingest::article::{extract_article_text, meta_published};
use crate::ingest::dates::{explicit_dates, is_stale, STALENESS_CEILING_DAYS};
use crate::ingest::feed::parse_feed;
use crate::ingest::text::{normalize_title, strip_byline, truncate_chars, word_count};
use crate::ingest::types::{LookbackWindow, SourceAdapter};
use crate::ingest::{canonical_url, ensure_metrics_described};
use crate::model::{NormalizedArticle, RawItem};
use crate::sources::SourceDirectory;

/// Article bodies below this fall back to the feed snippet.
pub const MIN_BODY_WORDS: usize = 25;
/// A snippet fallback needs at least this much to be more than a byline.
pub const MIN_SNIPPET_WORDS: usize = 12;
/// Newest items fetched per run, across all feeds.
pub const MAX_ARTICLES_PER_RUN: usize = 40;
/// Only the lead is searched for explicit dates; older dates deeper in a story
/// are usually background.
const LEAD_CHARS: usize = 240;

static RE_LIST_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:top\s+)?\d+\s+(?:\S+\s+){0,3}?(?:things|takeaways|players|reasons|moves|questions|storylines|winners|losers|predictions|sleepers|busts|overreactions|observations)\b|^(?:power\s+)?rankings?\b|^(?:best|worst)\s|\bpower rankings\b|\branked\b",
    )
    .expect("list title regex")
});

/// Why an item was screened out before its body was fetched.
pub fn screen_item(item: &RawItem, now: DateTime<Utc>) -> Option<&'static str> {
    if RE_LIST_TITLE.is_match(item.title.trim()) {
        return Some("list_title");
    }
    if has_stale_date(&format!("{} {}", item.title, item.snippet), now) {
        return Some("stale_date");
    }
    None
}

fn has_stale_date(text: &str, now: DateTime<Utc>) -> bool {
    let today = now.date_naive();
    explicit_dates(text)
        .into_iter()
        .any(|d| (today - d).num_days() > STALENESS_CEILING_DAYS)
}

/// Cleaned body for an item: the article text when substantial, else the
/// snippet, else `None` (byline-only stubs, paywall teasers).
pub fn body_text(item: &RawItem, html: Option<&str>, now: DateTime<Utc>) -> Option<String> {
    if let Some(html) = html {
        if meta_published(html).map_or(false, |t| is_stale(t, now)) {
            return None;
        }
        let text = extract_article_text(html);
        if word_count(&text) >= MIN_BODY_WORDS {
            if has_stale_date(&truncate_chars(&text, LEAD_CHARS), now) {
                return None;
            }
            return Some(text);
        }
    }
    let snippet = strip_byline(&item.snippet);
    (word_count(&snippet) >= MIN_SNIPPET_WORDS).then_some(snippet)
}

pub struct FullTextAdapter {
    fetcher: Arc<dyn Fetch>,
    feeds: Vec<String>,
    feed_timeout: Duration,
    article_timeout: Duration,
    directory: Arc<SourceDirectory>,
}

impl FullTextAdapter {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        feeds: Vec<String>,
        feed_timeout: Duration,
        article_timeout: Duration,
        directory: Arc<SourceDirectory>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            fetcher,
            feeds,
            feed_timeout,
            article_timeout,
            directory,
        }
    }

    /// Items from every feed that answered; failing feeds are skipped. Errors
    /// only when no feed could be read at all.
    async fn read_feeds(&self) -> Result<Vec<RawItem>> {
        let mut responses = fetch_all(&self.fetcher, self.feeds.clone(), self.feed_timeout).await;
        let mut items = Vec::new();
        let mut ok_feeds = 0usize;
        for feed in &self.feeds {
            let parsed = match responses.remove(feed) {
                Some(Ok(xml)) => parse_feed(&xml).map_err(|e| e.to_string()),
                Some(Err(e)) => Err(e.to_string()),
                None => continue,
            };
            match parsed {
                Ok(v) => {
                    ok_feeds += 1;
                    items.extend(v);
                }
                Err(e) => {
                    counter!("ingest_adapter_errors_total", "adapter" => "feed").increment(1);
                    warn!(target: "ingest", feed = %feed, error = %e, "feed skipped");
                }
            }
        }
        if ok_feeds == 0 && !self.feeds.is_empty() {
            return Err(anyhow!("none of {} news feeds could be read", self.feeds.len()));
        }
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for FullTextAdapter {
    async fn fetch_recent(&self, window: LookbackWindow) -> Result<Vec<NormalizedArticle>> {
        let items = self.read_feeds().await?;
        let total = items.len();

        let mut seen = HashSet::new();
        let mut candidates: Vec<(RawItem, DateTime<Utc>)> = Vec::new();
        for item in items {
            let Some(ts) = item.published_at else {
                continue;
            };
            if !window.contains(ts) || is_stale(ts, window.now) {
                continue;
            }
            if !seen.insert(canonical_url(&item.url)) {
                continue;
            }
            if let Some(reason) = screen_item(&item, window.now) {
                debug!(target: "ingest", reason, url = %item.url, "item screened out");
                continue;
            }
            candidates.push((item, ts));
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.url.cmp(&b.0.url)));
        candidates.truncate(MAX_ARTICLES_PER_RUN);

        let urls = candidates.iter().map(|(it, _)| it.url.clone()).collect();
        let mut bodies = fetch_all(&self.fetcher, urls, self.article_timeout).await;

        let mut out = Vec::with_capacity(candidates.len());
        for (item, ts) in candidates {
            let html = match bodies.remove(&item.url) {
                Some(Ok(html)) => Some(html),
                Some(Err(e)) => {
                    counter!("ingest_adapter_errors_total", "adapter" => "feed").increment(1);
                    debug!(target: "ingest", error = %e, "article fetch failed; using snippet");
                    None
                }
                None => None,
            };
            let Some(text) = body_text(&item, html.as_deref(), window.now) else {
                debug!(target: "ingest", url = %item.url, "stub or stale body dropped");
                continue;
            };
            let title = normalize_title(&item.title);
            out.push(NormalizedArticle {
                canonical_url: canonical_url(&item.url),
                source: self.directory.short_name(&item.url),
                hints: hints_for(&title, &text),
                title,
                text,
                published_at: ts,
                bullet: None,
            });
        }

        counter!("ingest_articles_total", "adapter" => "feed").increment(out.len() as u64);
        info!(
            target: "ingest",
            feeds = self.feeds.len(),
            items = total,
            kept = out.len(),
            hours = window.hours,
            "news feeds read"
        );
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "news-feeds"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap()
    }

    fn raw(title: &str, snippet: &str) -> RawItem {
        RawItem {
            url: "https://espn.com/nfl/story/1".into(),
            title: title.into(),
            published_at: Some(now()),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn list_titles_are_screened() {
        for t in [
            "10 things we learned from the preseason",
            "Top 5 storylines for Week 1",
            "Power Rankings: Week 2",
            "Best and worst of Sunday",
        ] {
            assert_eq!(screen_item(&raw(t, ""), now()), Some("list_title"), "{t}");
        }
        assert_eq!(screen_item(&raw("Rams place Nacua on IR", ""), now()), None);
    }

    #[test]
    fn explicit_old_dates_are_screened() {
        let item = raw("Bengals sign tackle", "Originally published June 2, 2025.");
        assert_eq!(screen_item(&item, now()), Some("stale_date"));
        let fresh = raw("Bengals sign tackle", "Updated August 14, 2025.");
        assert_eq!(screen_item(&fresh, now()), None);
    }

    #[test]
    fn byline_only_stub_is_dropped_and_snippet_is_fallback() {
        let stub = raw("Rams news", "By Adam Schefter");
        assert_eq!(body_text(&stub, Some("<p>By Adam Schefter</p>"), now()), None);

        let snippet = "The Rams placed wide receiver Puka Nacua on injured reserve Monday with a high ankle sprain suffered in practice.";
        let item = raw("Rams place Nacua on IR", snippet);
        assert_eq!(body_text(&item, None, now()).as_deref(), Some(snippet));
    }
}
