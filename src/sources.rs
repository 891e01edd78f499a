//! # Source Directory
//!
//! Maps article hosts (e.g. "profootballtalk.nbcsports.com", "www.espn.com")
//! to the short citation names used at the end of every bullet ("PFT", "ESPN").
//!
//! - Loads from JSON config (names + aliases), merged over a built-in seed.
//! - Case-insensitive lookup on the host; `www.` is ignored.
//! - Fallback order: aliases → exact host → parent-domain suffix → derived name.

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

use crate::ingest::domain_of;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDirectory {
    /// Host (without `www.`) → short display name.
    #[serde(default)]
    pub names: HashMap<String, String>,
    /// Alternate host → canonical host present in `names`.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl SourceDirectory {
    /// Load extra mappings from a JSON file on top of the built-in seed.
    /// An unreadable or malformed file leaves the seed as is.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let mut dir = Self::default_seed();
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<SourceDirectory>(&s) {
                Ok(extra) => dir.merge(extra),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "source directory parse error; using built-in names")
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "source directory unreadable; using built-in names")
            }
        }
        dir
    }

    pub fn merge(&mut self, other: SourceDirectory) {
        for (k, v) in other.names {
            self.names.insert(normalize_host(&k), v.trim().to_string());
        }
        for (k, v) in other.aliases {
            self.aliases.insert(normalize_host(&k), normalize_host(&v));
        }
    }

    /// Short name for a URL or bare host.
    pub fn short_name(&self, url_or_host: &str) -> String {
        let host = domain_of(url_or_host).unwrap_or_else(|| normalize_host(url_or_host));

        // 1) Alias resolution.
        if let Some(canon) = self.aliases.get(&host) {
            if let Some(name) = self.names.get(canon) {
                return name.clone();
            }
        }

        // 2) Exact host.
        if let Some(name) = self.names.get(&host) {
            return name.clone();
        }

        // 3) Parent domain: longest registered suffix wins.
        let mut best: Option<(&String, &String)> = None;
        for (k, v) in &self.names {
            let is_parent = host
                .strip_suffix(k.as_str())
                .is_some_and(|rest| rest.ends_with('.'));
            if is_parent && best.map_or(true, |(bk, _)| k.len() > bk.len()) {
                best = Some((k, v));
            }
        }
        if let Some((_, v)) = best {
            return v.clone();
        }

        // 4) Derived: second-level label, uppercased.
        derive_name(&host)
    }

    /// Built-in names for the default endpoints and common NFL outlets.
    pub fn default_seed() -> Self {
        let mut names = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("espn.com", "ESPN"),
            ("nfl.com", "NFL.com"),
            ("cbssports.com", "CBS Sports"),
            ("rotowire.com", "RotoWire"),
            ("nbcsports.com", "NBC Sports"),
            ("profootballtalk.nbcsports.com", "PFT"),
            ("apnews.com", "AP"),
            ("yahoo.com", "Yahoo Sports"),
            ("si.com", "SI"),
            ("usatoday.com", "USA Today"),
            ("spotrac.com", "Spotrac"),
            ("overthecap.com", "OverTheCap"),
            ("theathletic.com", "The Athletic"),
            ("nytimes.com", "NYT"),
        ] {
            names.insert(k.to_string(), v.to_string());
        }

        for (a, c) in [
            ("espn.go.com", "espn.com"),
            ("a.espncdn.com", "espn.com"),
            ("sports.yahoo.com", "yahoo.com"),
            ("ftw.usatoday.com", "usatoday.com"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self { names, aliases }
    }
}

fn normalize_host(s: &str) -> String {
    let s = s.trim().trim_end_matches('.').to_ascii_lowercase();
    s.strip_prefix("www.").unwrap_or(&s).to_string()
}

fn derive_name(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let label = match labels.len() {
        0 => return "Unknown".to_string(),
        1 => labels[0],
        n => labels[n - 2],
    };
    label.to_ascii_uppercase()
}
