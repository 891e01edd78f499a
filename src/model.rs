// src/model.rs
//! Shared records that flow through the pipeline:
//! `RawItem` → `NormalizedArticle` → `ClassifiedItem` → `CategoryResult`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output categories. "No category" is represented by `Option::None` at the
/// classifier boundary and is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Injury,
    Roster,
    Breaking,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Injury, Category::Roster, Category::Breaking];

    /// Maximum number of bullets published per category.
    pub fn cap(self) -> usize {
        match self {
            Category::Injury => 20,
            Category::Roster => 12,
            Category::Breaking => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Injury => "injury",
            Category::Roster => "roster",
            Category::Breaking => "breaking",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record as a source hands it over, before any cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub snippet: String,
}

/// Optional subject/group hints found while normalizing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHints {
    pub person: Option<String>,
    /// Team abbreviation, e.g. "LAR".
    pub team: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    /// Dedup key for the whole aggregation call.
    pub canonical_url: String,
    /// Short display name, e.g. "ESPN".
    pub source: String,
    pub title: String,
    /// Cleaned body text (bylines and boilerplate removed).
    pub text: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub hints: EntityHints,
    /// Set by structured adapters that already produce a final bullet.
    #[serde(default)]
    pub bullet: Option<String>,
}

impl NormalizedArticle {
    /// Host of the canonical URL without a leading `www.`.
    pub fn domain(&self) -> String {
        crate::ingest::domain_of(&self.canonical_url).unwrap_or_default()
    }
}

/// Normalized `(person, team)` pair used as the secondary dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub person: String,
    pub team: String,
}

impl EntityKey {
    /// Builds a key from free-text name and optional team code.
    /// Returns `None` when the name normalizes to nothing.
    pub fn new(person: &str, team: Option<&str>) -> Option<Self> {
        let person = normalize_person(person);
        if person.is_empty() {
            return None;
        }
        let team = team
            .map(|t| t.trim().to_ascii_uppercase())
            .unwrap_or_default();
        Some(Self { person, team })
    }
}

fn normalize_person(name: &str) -> String {
    const SUFFIXES: [&str; 5] = ["jr", "sr", "ii", "iii", "iv"];
    name.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty() && !SUFFIXES.contains(&w.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedItem {
    pub article: NormalizedArticle,
    pub category: Category,
    pub fact_bullet: String,
    pub entity: Option<EntityKey>,
}

/// Final, capped output for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub bullets: Vec<String>,
    pub total_count: usize,
    pub overflow: usize,
    pub source: String,
}

impl CategoryResult {
    pub fn empty() -> Self {
        Self {
            bullets: Vec::new(),
            total_count: 0,
            overflow: 0,
            source: "None".to_string(),
        }
    }
}

/// Public result of one aggregation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedResults {
    pub injury: CategoryResult,
    pub roster: CategoryResult,
    pub breaking: CategoryResult,
    pub fallbacks_used: Vec<String>,
}

impl CategorizedResults {
    pub fn get(&self, category: Category) -> &CategoryResult {
        match category {
            Category::Injury => &self.injury,
            Category::Roster => &self.roster,
            Category::Breaking => &self.breaking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_ignores_case_suffix_and_punctuation() {
        let a = EntityKey::new("Odell Beckham Jr.", Some("bal")).unwrap();
        let b = EntityKey::new("odell  beckham", Some("BAL")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.person, "odell beckham");
        assert_eq!(a.team, "BAL");
    }

    #[test]
    fn entity_key_requires_a_name() {
        assert!(EntityKey::new("  .. ", Some("KC")).is_none());
    }

    #[test]
    fn category_result_serializes_camel_case() {
        let r = CategoryResult::empty();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["totalCount"], 0);
        assert_eq!(v["source"], "None");
    }
}
