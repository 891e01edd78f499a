// src/ingest/text.rs
//! Text cleanup shared by adapters and the classifier: entity decoding, tag
//! stripping, byline removal, and a sentence splitter that knows about name
//! initials and common abbreviations.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLOCK_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)</?(?:p|br|div|li|ul|ol|tr|td|th|h[1-6]|section|article|blockquote)\b[^>]*>")
        .expect("block tag regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Decode entities, strip tags, normalize quotes and collapse whitespace.
/// Keeps punctuation intact (sentences still need their terminators).
pub fn clean_fragment(s: &str) -> String {
    // 1) HTML entity decode
    let decoded = html_escape::decode_html_entities(s);

    // 2) Strip tags; block tags become spaces so paragraphs don't glue together
    let out = RE_BLOCK_TAGS.replace_all(&decoded, " ");
    let out = RE_TAGS.replace_all(&out, "");

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes, nbsp to space
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    // 4) Collapse whitespace
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Title normalization: `clean_fragment` + stray trailing punctuation + length cap.
pub fn normalize_title(s: &str) -> String {
    let mut out = clean_fragment(s);
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',' | ':' | ';') {
            out.pop();
        } else {
            break;
        }
    }
    truncate_chars(&out, 300)
}

/// Char-boundary-safe prefix of at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// True when the text has letters and none of them is lowercase.
pub fn is_all_caps(s: &str) -> bool {
    let mut letters = s.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| !c.is_lowercase())
}

static RE_BYLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^By\s+(?:[A-Z][\w.'-]*\s*){1,4}(?:(?:\band\b|&)\s*(?:[A-Z][\w.'-]*\s*){1,3})*")
        .expect("byline regex")
});
static RE_BYLINE_ROLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[|,-]\s*)?(?:[A-Z][\w.&'-]*\s+){0,3}(?:Staff\s+|Senior\s+|NFL\s+)?(?:Writer|Reporter|Correspondent|Insider|Editor|Contributor)\b\s*",
    )
    .expect("byline role regex")
});
const STAMP: &str = r"[A-Z][a-z]{2,8}\.?\s+\d{1,2},\s+\d{4}(?:,?\s*(?:at\s+)?\d{1,2}:\d{2}\s*[AaPp]\.?[Mm]\.?(?:\s*[A-Z]{2,3}\b)?)?";
static RE_STAMP_ANYWHERE: Lazy<Regex> = Lazy::new(|| Regex::new(STAMP).expect("stamp regex"));
static RE_STAMP_LEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(?:[|,-]\s*)?(?:Published|Updated)?:?\s*{STAMP}\s*"))
        .expect("leading stamp regex")
});

/// Remove a leading byline ("By A B, ESPN Staff Writer Aug 14, 2025, 9:12 AM ET").
pub fn strip_byline(text: &str) -> String {
    let mut t = text.trim_start();
    if t.starts_with("By ") {
        // A dateline close to the byline marks where the article starts.
        let head = truncate_chars(t, 200);
        if let Some(m) = RE_STAMP_ANYWHERE.find(&head) {
            t = t[m.end()..].trim_start();
        } else if let Some(m) = RE_BYLINE.find(t) {
            t = t[m.end()..].trim_start();
            if let Some(m) = RE_BYLINE_ROLE.find(t) {
                t = t[m.end()..].trim_start();
            }
        }
    }
    if let Some(m) = RE_STAMP_LEADING.find(t) {
        t = t[m.end()..].trim_start();
    }
    t.trim_start_matches(['|', '-', ':', ',']).trim().to_string()
}

const ABBREVIATIONS: [&str; 23] = [
    "jr", "sr", "st", "mr", "mrs", "dr", "vs", "inc", "lt", "gen", "mt", "ft", "jan", "feb", "mar",
    "apr", "aug", "sep", "sept", "oct", "nov", "dec", "ave",
];

/// Split text into sentences. A terminator (`.`, `!`, `?`) ends a sentence when
/// followed by whitespace and an uppercase letter, digit or quote, unless the
/// word before it is a single-letter initial or a known abbreviation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = Vec::new();
    let mut start = 0usize;

    for i in 0..chars.len() {
        let (pos, ch) = chars[i];
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        // absorb closing quotes/parens right after the terminator
        let mut j = i + 1;
        while j < chars.len() && matches!(chars[j].1, '"' | '\'' | ')') {
            j += 1;
        }
        let end = chars.get(j).map(|c| c.0).unwrap_or(text.len());
        let next = chars[j..].iter().map(|c| c.1).find(|c| !c.is_whitespace());
        if j < chars.len() {
            if !chars[j].1.is_whitespace() {
                continue;
            }
            match next {
                Some(c) if c.is_uppercase() || c.is_ascii_digit() || c == '"' || c == '\'' => {}
                _ => continue,
            }
        }
        if ch == '.' && ends_with_abbreviation(&text[start..pos], next) {
            continue;
        }
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            out.push(sentence.to_string());
        }
        start = end;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

fn ends_with_abbreviation(before: &str, next: Option<char>) -> bool {
    let word = before
        .rsplit(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");
    let bare = word.trim_matches('.');
    if bare.is_empty() {
        return false;
    }
    // "A.J" / "T" style initials
    if bare.split('.').all(|p| p.chars().count() == 1 && p.chars().all(char::is_uppercase)) {
        return true;
    }
    let lower = bare.to_ascii_lowercase();
    // "No. 1 pick" but not "said no. The"
    if lower == "no" {
        return next.is_some_and(|c| c.is_ascii_digit());
    }
    ABBREVIATIONS.contains(&lower.as_str())
}
