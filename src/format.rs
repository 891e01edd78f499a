// src/format.rs
//! Output formatter: whitespace/punctuation cleanup, citation guarantee,
//! length cap, per-category cap and overflow accounting.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Category, CategoryResult};

/// Hard upper bound for one bullet, citation included.
pub const MAX_BULLET_CHARS: usize = 320;

/// `… (ESPN)` / `… (NFL.com)` / `… (Yahoo Sports)` at the very end.
static RE_CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?s)(.*?)\s*\(([A-Z0-9][A-Za-z0-9.&' +-]{0,38})\)\s*\.?$").expect("citation regex")
});
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// One bullet in final form, or `None` when nothing is left after cleanup.
pub fn format_bullet(raw: &str, default_source: &str) -> Option<String> {
    let collapsed = RE_WS.replace_all(raw.trim(), " ");
    let (body, source) = match RE_CITATION.captures(&collapsed) {
        Some(c) => (c[1].to_string(), c[2].trim().to_string()),
        None => (collapsed.to_string(), default_source.trim().to_string()),
    };
    let body = body
        .trim()
        .trim_end_matches([',', ';', ':', '-', '\u{2014}', '.', ' '])
        .trim()
        .to_string();
    if body.is_empty() {
        return None;
    }
    let source = if source.is_empty() {
        "Unknown".to_string()
    } else {
        source
    };

    let suffix = format!(" ({source})");
    let budget = MAX_BULLET_CHARS.saturating_sub(suffix.chars().count());
    let body = truncate_at_word(&body, budget);
    Some(format!("{body}{suffix}"))
}

/// Cut at the last word boundary that leaves room for an ellipsis.
fn truncate_at_word(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let limit = max_chars.saturating_sub(1);
    let prefix: String = s.chars().take(limit).collect();
    let cut = match prefix.rfind(' ') {
        Some(i) if i > limit / 2 => &prefix[..i],
        _ => prefix.as_str(),
    };
    let cut = cut.trim_end_matches([',', ';', ':', '-', ' ']);
    format!("{cut}\u{2026}")
}

/// Final `CategoryResult`: format, drop exact duplicates, cap, overflow.
/// `source` is replaced with `"None"` when no bullet survives.
pub fn finalize(
    category: Category,
    bullets: &[String],
    default_source: &str,
    source: &str,
) -> CategoryResult {
    let mut seen = std::collections::HashSet::new();
    let formatted: Vec<String> = bullets
        .iter()
        .filter_map(|b| format_bullet(b, default_source))
        .filter(|b| seen.insert(b.clone()))
        .collect();

    let total_count = formatted.len();
    let cap = category.cap();
    let bullets: Vec<String> = formatted.into_iter().take(cap).collect();
    let overflow = total_count.saturating_sub(cap);
    if bullets.is_empty() {
        return CategoryResult::empty();
    }
    CategoryResult {
        bullets,
        total_count,
        overflow,
        source: if source.trim().is_empty() {
            "None".to_string()
        } else {
            source.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_existing_citation() {
        let b = format_bullet(
            "Matthew Stafford (LAR) \u{2014} Limited (back issue) \u{00B7} Updated Aug 14 (ESPN)",
            "X",
        )
        .unwrap();
        assert_eq!(
            b,
            "Matthew Stafford (LAR) \u{2014} Limited (back issue) \u{00B7} Updated Aug 14 (ESPN)"
        );
    }

    #[test]
    fn appends_default_source_and_trims_punct() {
        assert_eq!(
            format_bullet("  Bengals   sign tackle;  ", "PFT").unwrap(),
            "Bengals sign tackle (PFT)"
        );
        // lowercase parenthetical is content, not a citation
        assert_eq!(
            format_bullet("Stafford limited (back issue)", "ESPN").unwrap(),
            "Stafford limited (back issue) (ESPN)"
        );
        assert!(format_bullet(" ;; (ESPN)", "ESPN").is_none());
    }

    #[test]
    fn long_bullets_truncate_on_word_boundary() {
        let long = format!("{} (AP)", "word ".repeat(100));
        let b = format_bullet(&long, "X").unwrap();
        assert!(b.chars().count() <= MAX_BULLET_CHARS);
        assert!(b.ends_with("word\u{2026} (AP)"));
    }

    #[test]
    fn caps_and_overflow() {
        let bullets: Vec<String> = (0..15).map(|i| format!("Player {i} signed (NFL.com)")).collect();
        let r = finalize(Category::Roster, &bullets, "X", "transactions");
        assert_eq!(r.bullets.len(), 12);
        assert_eq!(r.total_count, 15);
        assert_eq!(r.overflow, 3);
        assert_eq!(r.source, "transactions");
    }

    #[test]
    fn exact_duplicates_and_empty() {
        let bullets = vec!["A signed (AP)".to_string(), "A  signed (AP)".to_string()];
        let r = finalize(Category::Breaking, &bullets, "X", "feed");
        assert_eq!(r.bullets, vec!["A signed (AP)".to_string()]);
        assert_eq!(r.overflow, 0);

        let r = finalize(Category::Injury, &[], "X", "table");
        assert_eq!(r, CategoryResult::empty());
    }
}
