// src/ingest/article.rs
//! Article body extraction: paragraph text with scripts, navigation, bylines
//! and promo boilerplate removed.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::dates::parse_feed_date;
use crate::ingest::text::{clean_fragment, strip_byline, truncate_chars, word_count};

/// Article text is cut at this many characters before classification.
pub const MAX_ARTICLE_CHARS: usize = 6_000;

static RE_NOISE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        "script", "style", "noscript", "nav", "header", "footer", "aside", "figure", "form",
        "svg", "iframe",
    ]
    .iter()
    .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>")).expect("noise block regex"))
    .collect()
});
static RE_COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));
static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>").expect("paragraph regex"));
static RE_BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(subscribe|sign up|newsletter|advertisement|click here|follow (us|him|her) on|all rights reserved|©|copyright|terms of (use|service)|privacy policy|cookie|download the .{0,20}app|^read more|^related:|^watch:|^listen:|^more:|^(photo|image) credit|getty images|usa today sports images|\bespn\+|stream .{0,30} live)",
    )
    .expect("boilerplate regex")
});
static RE_META_PUBLISHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta[^>]+(?:property|name|itemprop)=["'](?:article:published_time|datePublished|pubdate|date)["'][^>]*content=["']([^"']+)["']"#)
        .expect("meta published regex")
});

/// Cleaned article body: `<p>` text minus boilerplate, byline stripped,
/// capped at `MAX_ARTICLE_CHARS`. Empty when the page has no usable paragraphs.
pub fn extract_article_text(html: &str) -> String {
    let mut body = RE_COMMENTS.replace_all(html, " ").into_owned();
    for re in RE_NOISE_BLOCKS.iter() {
        body = re.replace_all(&body, " ").into_owned();
    }

    let paragraphs: Vec<String> = RE_PARAGRAPH
        .captures_iter(&body)
        .map(|c| clean_fragment(&c[1]))
        .filter(|p| !p.is_empty() && !is_boilerplate(p))
        .collect();

    let joined = paragraphs.join(" ");
    truncate_chars(&strip_byline(&joined), MAX_ARTICLE_CHARS)
}

fn is_boilerplate(paragraph: &str) -> bool {
    // Short promo lines ("Subscribe to our newsletter") and credit lines.
    word_count(paragraph) < 40 && RE_BOILERPLATE.is_match(paragraph)
}

/// `article:published_time` style meta tag, when the page has one.
pub fn meta_published(html: &str) -> Option<DateTime<Utc>> {
    let c = RE_META_PUBLISHED.captures(html)?;
    parse_feed_date(&c[1])
}
