// src/classify/entities.rs
//! Lightweight entity extraction: NFL team dictionary + capitalized-name
//! heuristic. Approximate by nature; callers treat a miss as "no hint".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::EntityHints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Team {
    pub abbr: &'static str,
    pub city: &'static str,
    pub nickname: &'static str,
}

impl Team {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.city, self.nickname)
    }
}

const fn team(abbr: &'static str, city: &'static str, nickname: &'static str) -> Team {
    Team {
        abbr,
        city,
        nickname,
    }
}

pub const TEAMS: [Team; 32] = [
    team("ARI", "Arizona", "Cardinals"),
    team("ATL", "Atlanta", "Falcons"),
    team("BAL", "Baltimore", "Ravens"),
    team("BUF", "Buffalo", "Bills"),
    team("CAR", "Carolina", "Panthers"),
    team("CHI", "Chicago", "Bears"),
    team("CIN", "Cincinnati", "Bengals"),
    team("CLE", "Cleveland", "Browns"),
    team("DAL", "Dallas", "Cowboys"),
    team("DEN", "Denver", "Broncos"),
    team("DET", "Detroit", "Lions"),
    team("GB", "Green Bay", "Packers"),
    team("HOU", "Houston", "Texans"),
    team("IND", "Indianapolis", "Colts"),
    team("JAX", "Jacksonville", "Jaguars"),
    team("KC", "Kansas City", "Chiefs"),
    team("LV", "Las Vegas", "Raiders"),
    team("LAC", "Los Angeles", "Chargers"),
    team("LAR", "Los Angeles", "Rams"),
    team("MIA", "Miami", "Dolphins"),
    team("MIN", "Minnesota", "Vikings"),
    team("NE", "New England", "Patriots"),
    team("NO", "New Orleans", "Saints"),
    team("NYG", "New York", "Giants"),
    team("NYJ", "New York", "Jets"),
    team("PHI", "Philadelphia", "Eagles"),
    team("PIT", "Pittsburgh", "Steelers"),
    team("SF", "San Francisco", "49ers"),
    team("SEA", "Seattle", "Seahawks"),
    team("TB", "Tampa Bay", "Buccaneers"),
    team("TEN", "Tennessee", "Titans"),
    team("WAS", "Washington", "Commanders"),
];

/// Abbreviations some sources use instead of the ones above.
const ABBR_ALIASES: [(&str, &str); 6] = [
    ("WSH", "WAS"),
    ("JAC", "JAX"),
    ("LA", "LAR"),
    ("GNB", "GB"),
    ("KAN", "KC"),
    ("SFO", "SF"),
];

pub fn team_by_abbr(abbr: &str) -> Option<&'static Team> {
    let up = abbr.trim().to_ascii_uppercase();
    let up = ABBR_ALIASES
        .iter()
        .find(|(alias, _)| *alias == up)
        .map(|(_, canon)| canon.to_string())
        .unwrap_or(up);
    TEAMS.iter().find(|t| t.abbr == up)
}

/// Exact team reference: abbreviation, full name or nickname (case-insensitive).
pub fn resolve_team(s: &str) -> Option<&'static Team> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    team_by_abbr(s).or_else(|| {
        TEAMS.iter().find(|t| {
            t.full_name().eq_ignore_ascii_case(s) || t.nickname.eq_ignore_ascii_case(s)
        })
    })
}

static RE_TEAM_NAMES: Lazy<Regex> = Lazy::new(|| {
    let mut alts: Vec<String> = TEAMS.iter().map(|t| regex::escape(&t.full_name())).collect();
    alts.extend(TEAMS.iter().map(|t| regex::escape(t.nickname)));
    Regex::new(&format!(r"\b(?:{})\b", alts.join("|"))).expect("team names regex")
});

/// Cities that identify exactly one team.
static RE_TEAM_CITIES: Lazy<Regex> = Lazy::new(|| {
    let alts: Vec<String> = TEAMS
        .iter()
        .filter(|t| TEAMS.iter().filter(|o| o.city == t.city).count() == 1)
        .map(|t| regex::escape(t.city))
        .collect();
    Regex::new(&format!(r"\b(?:{})\b", alts.join("|"))).expect("team cities regex")
});

/// First team mentioned in free text. Full names and nicknames win over
/// city-only mentions ("Cincinnati signed ...").
pub fn find_team(text: &str) -> Option<&'static Team> {
    if let Some(m) = RE_TEAM_NAMES.find(text) {
        return resolve_team(m.as_str());
    }
    let m = RE_TEAM_CITIES.find(text)?;
    TEAMS.iter().find(|t| t.city == m.as_str())
}

/// Last team named in `text`, e.g. the table title just before a table.
pub fn find_last_team(text: &str) -> Option<&'static Team> {
    let m = RE_TEAM_NAMES.find_iter(text).last()?;
    resolve_team(m.as_str())
}

static RE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b((?:[A-Z]\.){1,2}|[A-Z][a-zA-Z'-]+)\s+([A-Z][a-zA-Z'-]+)(?:\s+(?:Jr|Sr)\.|\s+(?:III|II|IV)\b)?",
    )
    .expect("name regex")
});

/// Capitalized words that start or end sentences about players but are
/// never part of a player's name.
const NAME_STOPWORDS: &[&str] = &[
    "the", "a", "an", "he", "she", "they", "his", "her", "their", "it", "this", "that", "after",
    "before", "when", "with", "on", "in", "at", "for", "per", "but", "and", "if", "as", "by",
    "sources", "source", "according", "report", "reports", "update", "breaking", "injury",
    "status", "coach", "head", "general", "manager", "owner", "quarterback", "receiver", "wide",
    "tight", "end", "running", "back", "linebacker", "cornerback", "safety", "tackle", "guard",
    "center", "defensive", "offensive", "kicker", "punter", "rookie", "veteran", "star", "pro",
    "bowl", "super", "week", "season", "preseason", "training", "camp", "practice", "game",
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "january",
    "february", "march", "april", "may", "june", "july", "august", "september", "october",
    "november", "december", "nfl", "afc", "nfc", "league", "football", "injured", "reserve",
    "questionable", "doubtful", "out", "limited", "full", "new", "york", "los", "angeles", "san",
    "las", "bay", "green", "kansas", "city", "tampa", "england", "orleans", "francisco", "vegas",
    "night", "team", "club", "free", "agent", "agency", "draft", "trade", "deadline", "espn",
    "adam", "schefter", "ian", "rapoport", "tom", "pelissero",
];

fn is_stopword(word: &str) -> bool {
    let w = word.trim_end_matches('.').to_ascii_lowercase();
    NAME_STOPWORDS.contains(&w.as_str())
        || TEAMS
            .iter()
            .any(|t| t.nickname.eq_ignore_ascii_case(&w) || t.city.eq_ignore_ascii_case(&w))
}

fn is_name_word(word: &str, allow_initials: bool) -> bool {
    if is_stopword(word) {
        return false;
    }
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        // "DE", "QB", "IR" but allow "A.J."
        return allow_initials && word.contains('.');
    }
    true
}

/// First "Firstname Lastname" looking phrase, e.g. "Puka Nacua", "A.J. Brown",
/// "Odell Beckham Jr.". Well-known reporters are skipped.
pub fn extract_person(text: &str) -> Option<String> {
    let mut pos = 0usize;
    while pos < text.len() {
        let c = RE_NAME.captures_at(text, pos)?;
        let first = c.get(1)?;
        let last = c.get(2)?;
        if is_name_word(first.as_str(), true) && is_name_word(last.as_str(), false) {
            return Some(c.get(0)?.as_str().trim().to_string());
        }
        // Retry from the second word: "Chiefs Travis Kelce" → "Travis Kelce".
        pos = last.start();
    }
    None
}

/// Team + person hints from a title (preferred) and the opening of the text.
pub fn hints_for(title: &str, text: &str) -> EntityHints {
    let lead: String = text.chars().take(400).collect();
    let team = find_team(title)
        .or_else(|| find_team(&lead))
        .map(|t| t.abbr.to_string());
    let person = extract_person(title).or_else(|| extract_person(&lead));
    EntityHints { person, team }
}
