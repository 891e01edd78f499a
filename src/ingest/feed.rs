// src/ingest/feed.rs
//! RSS 2.0 / Atom parsing into `RawItem`s.

use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use thiserror::Error;

use crate::ingest::dates::parse_feed_date;
use crate::ingest::text::clean_fragment;
use crate::model::RawItem;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("document is neither RSS nor Atom: {0}")]
    Unrecognized(String),
    #[error("feed has no channel/entries")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<Entry>,
}
#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    id: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}
#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}
/// Element whose text we want regardless of a `type="html"` attribute.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse an RSS or Atom document. Items without a link are skipped; a missing
/// or unparsable date leaves `published_at` empty for the caller to decide.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>, FeedError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let items = match from_str::<Rss>(&xml_clean) {
        Ok(rss) => rss
            .channel
            .item
            .into_iter()
            .filter_map(rss_item)
            .collect::<Vec<_>>(),
        Err(rss_err) => match from_str::<AtomFeed>(&xml_clean) {
            Ok(atom) if !atom.entry.is_empty() => {
                atom.entry.into_iter().filter_map(atom_entry).collect()
            }
            Ok(_) => return Err(FeedError::Empty),
            Err(_) => return Err(FeedError::Unrecognized(rss_err.to_string())),
        },
    };

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(items)
}

fn rss_item(it: Item) -> Option<RawItem> {
    let url = it.link.filter(|l| !l.trim().is_empty())?;
    let published_at = it.pub_date.as_deref().and_then(parse_feed_date);
    Some(RawItem {
        url: url.trim().to_string(),
        title: clean_fragment(it.title.as_deref().unwrap_or_default()),
        published_at,
        snippet: clean_fragment(it.description.as_deref().unwrap_or_default()),
    })
}

fn atom_entry(e: Entry) -> Option<RawItem> {
    let href = e
        .link
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
        .or(e.link.first())
        .and_then(|l| l.href.clone())
        .or(e.id.filter(|id| id.starts_with("http")))?;
    let published_at = e
        .published
        .as_deref()
        .or(e.updated.as_deref())
        .and_then(parse_feed_date);
    let snippet = e.summary.or(e.content).map(|t| t.value).unwrap_or_default();
    Some(RawItem {
        url: href.trim().to_string(),
        title: clean_fragment(&e.title.map(|t| t.value).unwrap_or_default()),
        published_at,
        snippet: clean_fragment(&snippet),
    })
}

/// HTML named entities are not valid XML; replace the common ones before the
/// XML parser sees them.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>NFL</title>
<item>
  <title>Rams place Puka Nacua on IR&nbsp;</title>
  <link>https://www.espn.com/nfl/story/_/id/1/rams-nacua?utm_source=rss</link>
  <pubDate>Thu, 14 Aug 2025 13:45:00 GMT</pubDate>
  <description><![CDATA[<p>The Rams placed receiver Puka Nacua on injured reserve.</p>]]></description>
</item>
<item><title>No link here</title></item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Wire</title>
  <entry>
    <title type="html">Bengals sign veteran tackle</title>
    <link rel="alternate" href="https://apnews.com/article/bengals-tackle"/>
    <id>tag:apnews.com,2025:1</id>
    <updated>2025-08-14T18:00:00Z</updated>
    <summary>Cincinnati signed a tackle on Thursday.</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items() {
        let items = parse_feed(RSS).unwrap();
        assert_eq!(items.len(), 1);
        let it = &items[0];
        assert_eq!(it.title, "Rams place Puka Nacua on IR");
        assert_eq!(
            it.published_at,
            Some(Utc.with_ymd_and_hms(2025, 8, 14, 13, 45, 0).unwrap())
        );
        assert_eq!(
            it.snippet,
            "The Rams placed receiver Puka Nacua on injured reserve."
        );
    }

    #[test]
    fn parses_atom_entries() {
        let items = parse_feed(ATOM).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://apnews.com/article/bengals-tackle");
        assert_eq!(items[0].title, "Bengals sign veteran tackle");
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed("<html><body>503</body></html>").is_err());
    }
}
