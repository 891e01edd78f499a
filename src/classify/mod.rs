// src/classify/mod.rs
//! Routes normalized articles to a category (or none) and synthesizes the
//! one-line fact bullet.
//!
//! Order of checks:
//! 1) hard exclusion phrases (title + lead),
//! 2) injury / roster / breaking vocabulary on title + text,
//! 3) per-category domain allowlist.
//!
//! Injury wins over roster; breaking is only considered when neither the
//! injury nor the roster vocabulary fired.

pub mod entities;
pub mod rules;

use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::debug;

use crate::cache::anon_hash;
use crate::ingest::text::{is_all_caps, split_sentences, word_count};
use crate::model::{Category, ClassifiedItem, EntityKey, NormalizedArticle};
pub use entities::{
    extract_person, find_last_team, find_team, hints_for, resolve_team, Team, TEAMS,
};
pub use rules::RuleTable;

/// Bullets shorter than this (in words, before prefix/citation) are rejected.
pub const MIN_BULLET_WORDS: usize = 4;

/// Exclusion phrases are checked against the title and this much of the text.
const EXCLUSION_LEAD_CHARS: usize = 280;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "classify_rejected_total",
            "Articles the classifier dropped, by reason."
        );
    });
}

fn rejected(reason: &'static str, article: &NormalizedArticle) {
    counter!("classify_rejected_total", "reason" => reason).increment(1);
    debug!(
        target: "classify",
        id = %anon_hash(&article.canonical_url),
        reason,
        "rejected"
    );
}

/// "CINCINNATI (AP) — " wire datelines.
static RE_DATELINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Z .,'-]{2,40}\s*\((?:AP|Reuters|ESPN)\)\s*[-\u{2014}\u{2013}]+\s*")
        .expect("dateline regex")
});

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: RuleTable,
}

impl Classifier {
    pub fn new(rules: RuleTable) -> Self {
        ensure_metrics_described();
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Category + bullet for a free-text article, or `None` when the article
    /// is noise, matches no vocabulary, comes from a domain outside the
    /// winning category's allowlist, or yields no acceptable sentence.
    pub fn classify(&self, article: &NormalizedArticle) -> Option<ClassifiedItem> {
        let lead: String = article.text.chars().take(EXCLUSION_LEAD_CHARS).collect();
        if self.rules.is_excluded(&article.title) || self.rules.is_excluded(&lead) {
            rejected("excluded", article);
            return None;
        }

        let haystack = format!("{}. {}", article.title, article.text);
        let injury = self.rules.matches(Category::Injury, &haystack);
        let roster = self.rules.matches(Category::Roster, &haystack);
        let breaking = self.rules.matches(Category::Breaking, &haystack);
        if !(injury || roster || breaking) {
            rejected("no_pattern", article);
            return None;
        }

        let host = article.domain();
        let category = if injury && self.rules.allows(Category::Injury, &host) {
            Category::Injury
        } else if roster && self.rules.allows(Category::Roster, &host) {
            Category::Roster
        } else if !injury && !roster && breaking && self.rules.allows(Category::Breaking, &host) {
            Category::Breaking
        } else {
            rejected("allowlist", article);
            return None;
        };

        let Some(sentence) = self.pick_sentence(category, article) else {
            rejected("quality", article);
            return None;
        };
        let (fact_bullet, entity) = compose_bullet(&sentence, article);
        Some(ClassifiedItem {
            article: article.clone(),
            category,
            fact_bullet,
            entity,
        })
    }

    /// Admit a pre-formatted adapter bullet into `category`, subject to the
    /// same allowlist as free text.
    pub fn accept_structured(
        &self,
        article: &NormalizedArticle,
        category: Category,
    ) -> Option<ClassifiedItem> {
        let bullet = article.bullet.as_ref()?;
        if !self.rules.allows(category, &article.domain()) {
            rejected("allowlist", article);
            return None;
        }
        let entity = article
            .hints
            .person
            .as_deref()
            .and_then(|p| EntityKey::new(p, article.hints.team.as_deref()));
        Some(ClassifiedItem {
            article: article.clone(),
            category,
            fact_bullet: bullet.clone(),
            entity,
        })
    }

    /// First sentence carrying the category's vocabulary that passes the
    /// quality gate; the title is the last resort.
    fn pick_sentence(&self, category: Category, article: &NormalizedArticle) -> Option<String> {
        let pattern = self.rules.pattern(category);
        split_sentences(&article.text)
            .into_iter()
            .map(|s| clean_sentence(&s))
            .filter(|s| pattern.is_match(s))
            .find(|s| self.passes_quality(s))
            .or_else(|| {
                let title = clean_sentence(&article.title);
                (pattern.is_match(&title) && self.passes_quality(&title)).then_some(title)
            })
    }

    pub fn passes_quality(&self, sentence: &str) -> bool {
        word_count(sentence) >= MIN_BULLET_WORDS
            && !is_all_caps(sentence)
            && self.rules.has_action_verb(sentence)
    }
}

fn clean_sentence(s: &str) -> String {
    let s = RE_DATELINE.replace(s.trim(), "");
    s.trim().trim_end_matches(['.', ' ']).to_string()
}

/// `Name (TEAM) — sentence (SOURCE)` / `TEAM — …` / `Name — …`.
/// The name is only prefixed when the sentence does not already mention it.
fn compose_bullet(sentence: &str, article: &NormalizedArticle) -> (String, Option<EntityKey>) {
    let in_sentence = extract_person(sentence);
    let person = in_sentence.clone().or_else(|| article.hints.person.clone());
    let team = find_team(sentence)
        .map(|t| t.abbr.to_string())
        .or_else(|| article.hints.team.clone());

    let needs_name = match (&in_sentence, &person) {
        (None, Some(p)) => !sentence.to_lowercase().contains(&p.to_lowercase()),
        _ => false,
    };
    let prefix = match (needs_name, person.as_deref(), team.as_deref()) {
        (true, Some(p), Some(t)) => format!("{p} ({t}) \u{2014} "),
        (true, Some(p), None) => format!("{p} \u{2014} "),
        (_, _, Some(t)) => format!("{t} \u{2014} "),
        _ => String::new(),
    };

    let entity = person
        .as_deref()
        .and_then(|p| EntityKey::new(p, team.as_deref()));
    (format!("{prefix}{sentence} ({})", article.source), entity)
}
