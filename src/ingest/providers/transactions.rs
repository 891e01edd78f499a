// src/ingest/providers/transactions.rs
//! Transactions feed: one RSS/Atom feed of signings, releases, trades and
//! reserve-list moves. Each item in the window is expanded by fetching the
//! article and picking the sentence that carries the transaction verb.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::fetch_all;
use crate::classify::entities::{extract_person, find_team};
use crate::fetch::Fetch;
use crate::ingest::article::extract_article_text;
use crate::ingest::dates::is_stale;
use crate::ingest::feed::parse_feed;
use crate::ingest::text::{clean_fragment, split_sentences, strip_byline, word_count};
use crate::ingest::types::{LookbackWindow, SourceAdapter};
use crate::ingest::{canonical_url, ensure_metrics_described};
use crate::model::{EntityHints, NormalizedArticle, RawItem};
use crate::sources::SourceDirectory;

/// How many sentences after the action sentence may supply the detail.
const DETAIL_LOOKAHEAD: usize = 3;
/// Article bodies shorter than this fall back to the feed snippet.
const MIN_BODY_WORDS: usize = 20;

static RE_TX_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:re-)?sign(?:s|ed|ing)?|waiv(?:e|es|ed|ing)|releas(?:e|es|ed|ing)|trad(?:e|es|ed|ing)|claim(?:s|ed|ing)?|activat(?:e|es|ed|ing)|plac(?:e|es|ed|ing)\b[^.]{0,60}\breserve|promot(?:e|es|ed|ing)|elevat(?:e|es|ed|ing)|acquir(?:e|es|ed|ing)|agree[sd]?\s+to\s+terms|terminat(?:e|es|ed|ing)|cuts?|restructur(?:e|es|ed|ing))\b",
    )
    .expect("transaction verb regex")
});

static RE_TX_DETAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\$\s?\d|\bmillion\b|\b\d+-year\b|\bcontract\b|\bguarantee|\bsigning bonus\b|\bincentives?\b|\bpractice squad\b|\breserve\b)",
    )
    .expect("transaction detail regex")
});

fn tidy(s: &str) -> String {
    s.trim().trim_end_matches(['.', ' ']).to_string()
}

/// First sentence with a transaction verb, plus the first contract/reserve
/// detail sentence shortly after it.
pub fn transaction_sentences(text: &str) -> Option<(String, Option<String>)> {
    let sentences: Vec<String> = split_sentences(text)
        .iter()
        .map(|s| tidy(s))
        .filter(|s| word_count(s) >= 4)
        .collect();
    let idx = sentences.iter().position(|s| RE_TX_ACTION.is_match(s))?;
    let detail = sentences
        .iter()
        .skip(idx + 1)
        .take(DETAIL_LOOKAHEAD)
        .find(|s| RE_TX_DETAIL.is_match(s))
        .cloned();
    Some((sentences[idx].clone(), detail))
}

/// `TEAM — sentence[; detail] (SOURCE)`; without a recognizable team the
/// group prefix is left out.
pub fn format_transaction_bullet(
    team: Option<&str>,
    sentence: &str,
    detail: Option<&str>,
    source: &str,
) -> String {
    let prefix = team.map(|t| format!("{t} \u{2014} ")).unwrap_or_default();
    let detail = detail.map(|d| format!("; {d}")).unwrap_or_default();
    format!("{prefix}{sentence}{detail} ({source})")
}

/// Build the article for one feed item from its body text (or snippet).
pub fn transaction_article(
    item: &RawItem,
    body: &str,
    source: &str,
) -> Option<NormalizedArticle> {
    let published_at = item.published_at?;
    let (sentence, detail) = transaction_sentences(body)
        .or_else(|| transaction_sentences(&item.title))?;
    let team = find_team(&sentence)
        .or_else(|| find_team(&item.title))
        .map(|t| t.abbr.to_string());
    let bullet = format_transaction_bullet(team.as_deref(), &sentence, detail.as_deref(), source);
    Some(NormalizedArticle {
        canonical_url: canonical_url(&item.url),
        source: source.to_string(),
        title: clean_fragment(&item.title),
        text: body.to_string(),
        published_at,
        hints: EntityHints {
            person: extract_person(&sentence),
            team,
        },
        bullet: Some(bullet),
    })
}

pub struct TransactionsAdapter {
    fetcher: Arc<dyn Fetch>,
    feed_url: String,
    feed_timeout: Duration,
    article_timeout: Duration,
    directory: Arc<SourceDirectory>,
}

impl TransactionsAdapter {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        feed_url: String,
        feed_timeout: Duration,
        article_timeout: Duration,
        directory: Arc<SourceDirectory>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            fetcher,
            feed_url,
            feed_timeout,
            article_timeout,
            directory,
        }
    }
}

#[async_trait]
impl SourceAdapter for TransactionsAdapter {
    async fn fetch_recent(&self, window: LookbackWindow) -> Result<Vec<NormalizedArticle>> {
        let xml = self
            .fetcher
            .fetch(&self.feed_url, self.feed_timeout)
            .await
            .with_context(|| format!("fetching transactions feed {}", self.feed_url))?;
        let items = parse_feed(&xml)
            .with_context(|| format!("parsing transactions feed {}", self.feed_url))?;

        let candidates: Vec<RawItem> = items
            .into_iter()
            .filter(|it| {
                it.published_at
                    .map_or(false, |t| window.contains(t) && !is_stale(t, window.now))
            })
            .collect();
        let urls = candidates.iter().map(|it| it.url.clone()).collect();
        let mut bodies = fetch_all(&self.fetcher, urls, self.article_timeout).await;

        let mut out = Vec::new();
        for item in &candidates {
            let article_text = match bodies.remove(&item.url) {
                Some(Ok(html)) => extract_article_text(&html),
                Some(Err(e)) => {
                    counter!("ingest_adapter_errors_total", "adapter" => "transactions")
                        .increment(1);
                    debug!(target: "ingest", error = %e, "article fetch failed; using snippet");
                    String::new()
                }
                None => String::new(),
            };
            let body = if word_count(&article_text) >= MIN_BODY_WORDS {
                article_text
            } else {
                strip_byline(&item.snippet)
            };
            let source = self.directory.short_name(&item.url);
            match transaction_article(item, &body, &source) {
                Some(a) => out.push(a),
                None => debug!(target: "ingest", url = %item.url, "no transaction sentence"),
            }
        }

        counter!("ingest_articles_total", "adapter" => "transactions").increment(out.len() as u64);
        info!(
            target: "ingest",
            candidates = candidates.len(),
            kept = out.len(),
            hours = window.hours,
            "transactions feed read"
        );
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "transactions-feed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn picks_action_sentence_and_detail() {
        let text = "The Bengals had a busy Tuesday. Cincinnati signed veteran tackle Cordell Volson to a one-year extension. The team also worked out two receivers. The deal is worth $4.5 million with $2 million guaranteed. Volson started 17 games last season.";
        let (s, d) = transaction_sentences(text).unwrap();
        assert_eq!(s, "Cincinnati signed veteran tackle Cordell Volson to a one-year extension");
        assert_eq!(
            d.as_deref(),
            Some("The deal is worth $4.5 million with $2 million guaranteed")
        );
    }

    #[test]
    fn reserve_placement_counts_as_action() {
        let (s, d) = transaction_sentences(
            "Coach spoke Monday. The Rams placed Puka Nacua on injured reserve Monday afternoon.",
        )
        .unwrap();
        assert!(s.starts_with("The Rams placed Puka Nacua"));
        assert!(d.is_none());
        assert!(transaction_sentences("The coach praised the offensive line on Monday.").is_none());
    }

    #[test]
    fn bullet_has_team_prefix_and_source() {
        let now = Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap();
        let item = RawItem {
            url: "https://www.profootballtalk.nbcsports.com/2025/08/15/bengals-volson/?utm_source=rss".into(),
            title: "Bengals sign Cordell Volson".into(),
            published_at: Some(now),
            snippet: String::new(),
        };
        let a = transaction_article(
            &item,
            "Cincinnati signed veteran tackle Cordell Volson to a one-year extension. It is a one-year contract worth $4.5 million.",
            "PFT",
        )
        .unwrap();
        assert_eq!(
            a.bullet.as_deref(),
            Some("CIN \u{2014} Cincinnati signed veteran tackle Cordell Volson to a one-year extension; It is a one-year contract worth $4.5 million (PFT)")
        );
        assert_eq!(
            a.canonical_url,
            "https://profootballtalk.nbcsports.com/2025/08/15/bengals-volson"
        );
        assert_eq!(a.hints.team.as_deref(), Some("CIN"));
    }
}
