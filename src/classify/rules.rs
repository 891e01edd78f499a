// src/classify/rules.rs
//! The classifier's rule table: exclusion phrases, per-category vocabulary,
//! domain allowlists and the action/state verb check used by the bullet
//! quality gate. Built-in defaults; any list can be replaced from TOML.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::ingest::domain_matches;
use crate::model::Category;

const DEFAULT_EXCLUSIONS: &[&str] = &[
    r"takeaways",
    r"\bdebut\b",
    r"stat ?line",
    r"\bgrades?\b",
    r"mock draft",
    r"fantasy",
    r"power rankings",
    r"things (?:we|to) learned",
    r"winners (?:and|&) losers",
    r"film (?:review|study|room)",
    r"\bodds\b",
    r"betting",
    r"best bets",
    r"\bpredictions?\b",
    r"\bpodcast\b",
    r"\bquiz\b",
];

const DEFAULT_INJURY: &[&str] = &[
    r"\binjur(?:y|ies|ed)\b",
    r"\binjured reserve\b",
    r"\bIR\b",
    r"\bquestionable\b",
    r"\bdoubtful\b",
    r"\bruled out\b",
    r"\bwill miss\b",
    r"\bout for the (?:season|year)\b",
    r"\bseason-ending\b",
    r"\b(?:day|week)-to-week\b|\bday-to-day\b",
    r"\blimited (?:in )?practice\b|\bdid not practice\b|\bDNP\b",
    r"\bconcussion(?: protocol)?\b",
    r"\b(?:hamstring|ankle|knee|groin|calf|shoulder|quad|hip|foot|wrist|elbow|toe|back|neck|oblique|pectoral) (?:injury|issue|strain|sprain|soreness|surgery|tightness)\b",
    r"\b(?:ACL|MCL|Achilles)\b",
    r"\btorn\b|\bsprained\b|\bfractured?\b|\bsurgery\b",
    r"\bPUP\b|\bphysically unable to perform\b",
    r"\bsidelined\b|\bcarted off\b",
    r"\bMRI\b",
    r"\b(?:return(?:ed|s)?|designated to return) (?:to|from) (?:practice|injured reserve|IR)\b",
];

const DEFAULT_ROSTER: &[&str] = &[
    r"\b(?:re-)?sign(?:s|ed|ing)?\b",
    r"\bwaive(?:s|d)?\b",
    r"\brelease(?:s|d)?\b",
    r"\bcut(?:s|ting)?\b",
    r"\btrade(?:s|d)?\b",
    r"\bacquire(?:s|d)?\b",
    r"\bclaim(?:s|ed)?\b",
    r"\bactivate(?:s|d)?\b",
    r"\b(?:promote|elevate)(?:s|d)?\b",
    r"\bpractice squad\b",
    r"\b(?:contract )?extension\b",
    r"\bagree(?:s|d)? to (?:terms|a deal)\b",
    r"\b(?:one|two|three|four|five|\d)-year (?:deal|contract|extension)\b",
    r"\bplace(?:s|d)? .{0,60}\bon (?:injured reserve|IR|reserve|the PUP list|the NFI list)\b",
    r"\breserve/(?:COVID-19|suspended|NFI|PUP|retired)\b",
    r"\brestructure(?:s|d)?\b",
    r"\bfranchise tag(?:ged)?\b",
    r"\bterminate(?:s|d)?\b",
    r"\breinstate(?:s|d)?\b",
];

const DEFAULT_BREAKING: &[&str] = &[
    r"\bbreaking\b",
    r"\bannounce(?:s|d|ment)?\b",
    r"\bretire(?:s|d|ment)?\b",
    r"\barrest(?:s|ed)?\b",
    r"\bcharged\b",
    r"\bfired\b",
    r"\bhire(?:s|d)?\b",
    r"\bsuspend(?:s|ed)?\b|\bsuspension\b",
    r"\bfined\b",
    r"\binvestigation\b",
    r"\blawsuit\b",
    r"\bsteps? down\b|\bstepped down\b",
    r"\bresign(?:s|ed|ation)\b",
    r"\bnamed (?:the )?(?:head coach|starter|starting quarterback|(?:offensive|defensive) coordinator)\b",
    r"\bdie[sd]\b|\bpassed away\b",
];

const DEFAULT_ACTION_VERBS: &[&str] = &[
    r"\b(?:is|are|was|were|will|has|have|had|be|been|remains?|won't|can't)\b",
    r"\b(?:sign|waive|release|trade|claim|activate|place|miss|return|suffer|undergo|agree|retire|hire|fire|announce|join|land|practice|exit|leave|expect|list|rule|restructure|suspend)\w*\b",
    r"\b(?:tore|torn|cut|out|left|sat|sits|named|set)\b",
    r"\b\w{3,}(?:ed|ing)\b",
];

const DEFAULT_INJURY_ALLOW: &[&str] = &[
    "espn.com",
    "nfl.com",
    "cbssports.com",
    "rotowire.com",
    "nbcsports.com",
    "apnews.com",
    "yahoo.com",
    "si.com",
];
const DEFAULT_ROSTER_ALLOW: &[&str] = &[
    "espn.com",
    "nfl.com",
    "nbcsports.com",
    "apnews.com",
    "spotrac.com",
    "overthecap.com",
];
const DEFAULT_BREAKING_ALLOW: &[&str] = &[
    "espn.com",
    "nfl.com",
    "nbcsports.com",
    "apnews.com",
    "cbssports.com",
    "yahoo.com",
    "si.com",
    "usatoday.com",
];

/// TOML override. Every list present replaces its default.
#[derive(Debug, Default, Deserialize)]
struct RuleTableToml {
    exclusions: Option<Vec<String>>,
    action_verbs: Option<Vec<String>>,
    #[serde(default)]
    patterns: BTreeMap<Category, Vec<String>>,
    #[serde(default)]
    allowlists: BTreeMap<Category, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct RuleTable {
    exclusions: Regex,
    injury: Regex,
    roster: Regex,
    breaking: Regex,
    action_verbs: Regex,
    allowlists: BTreeMap<Category, Vec<String>>,
}

impl Default for RuleTable {
    fn default() -> Self {
        // The built-in pattern lists are constants; failing to compile them is a bug.
        Self::build(RuleTableToml::default()).expect("built-in rule table compiles")
    }
}

impl RuleTable {
    /// Parse a TOML override on top of the built-in table.
    ///
    /// ```toml
    /// exclusions = ["takeaways", "mock draft"]
    /// [patterns]
    /// roster = ['\bsign(?:s|ed)?\b']
    /// [allowlists]
    /// roster = ["espn.com", "nfl.com"]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RuleTableToml = toml::from_str(s).context("parsing rule table toml")?;
        Self::build(raw)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading rule table from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    fn build(raw: RuleTableToml) -> Result<Self> {
        let list = |over: Option<&Vec<String>>, default: &[&str]| -> Vec<String> {
            match over {
                Some(v) => v.clone(),
                None => default.iter().map(|s| s.to_string()).collect(),
            }
        };
        let exclusions = compile_any(
            "exclusions",
            &list(raw.exclusions.as_ref(), DEFAULT_EXCLUSIONS),
        )?;
        let injury = compile_any(
            "injury",
            &list(raw.patterns.get(&Category::Injury), DEFAULT_INJURY),
        )?;
        let roster = compile_any(
            "roster",
            &list(raw.patterns.get(&Category::Roster), DEFAULT_ROSTER),
        )?;
        let breaking = compile_any(
            "breaking",
            &list(raw.patterns.get(&Category::Breaking), DEFAULT_BREAKING),
        )?;
        let action_verbs = compile_any(
            "action_verbs",
            &list(raw.action_verbs.as_ref(), DEFAULT_ACTION_VERBS),
        )?;

        let mut allowlists = BTreeMap::new();
        for (cat, default) in [
            (Category::Injury, DEFAULT_INJURY_ALLOW),
            (Category::Roster, DEFAULT_ROSTER_ALLOW),
            (Category::Breaking, DEFAULT_BREAKING_ALLOW),
        ] {
            let domains = list(raw.allowlists.get(&cat), default)
                .into_iter()
                .map(|d| d.trim().trim_start_matches("www.").to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
            allowlists.insert(cat, domains);
        }

        Ok(Self {
            exclusions,
            injury,
            roster,
            breaking,
            action_verbs,
            allowlists,
        })
    }

    pub fn is_excluded(&self, text: &str) -> bool {
        self.exclusions.is_match(text)
    }

    pub fn pattern(&self, category: Category) -> &Regex {
        match category {
            Category::Injury => &self.injury,
            Category::Roster => &self.roster,
            Category::Breaking => &self.breaking,
        }
    }

    pub fn matches(&self, category: Category, text: &str) -> bool {
        self.pattern(category).is_match(text)
    }

    pub fn allowlist(&self, category: Category) -> &[String] {
        self.allowlists
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Host equals an allowlisted domain or is one of its subdomains.
    pub fn allows(&self, category: Category, host: &str) -> bool {
        self.allowlist(category)
            .iter()
            .any(|d| domain_matches(host, d))
    }

    pub fn has_action_verb(&self, text: &str) -> bool {
        self.action_verbs.is_match(text)
    }
}

/// Case-insensitive alternation of all patterns in `list`.
fn compile_any(name: &str, list: &[String]) -> Result<Regex> {
    let body = if list.is_empty() {
        // matches nothing
        r"[^\s\S]".to_string()
    } else {
        list.iter()
            .map(|p| format!("(?:{p})"))
            .collect::<Vec<_>>()
            .join("|")
    };
    Regex::new(&format!("(?i){body}")).with_context(|| format!("compiling {name} patterns"))
}
