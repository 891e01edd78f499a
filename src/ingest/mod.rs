// src/ingest/mod.rs
pub mod article;
pub mod dates;
pub mod feed;
pub mod providers;
pub mod text;
pub mod types;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use url::Url;

pub use types::{AdapterKind, AdapterRegistry, LookbackWindow, SourceAdapter};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_articles_total",
            "Normalized articles produced by source adapters."
        );
        describe_counter!(
            "ingest_adapter_errors_total",
            "Feed, row or article failures skipped by adapters."
        );
        describe_histogram!("ingest_parse_ms", "Feed/table parse time in milliseconds.");
    });
}

/// Query parameters that only carry campaign/referral tracking.
const TRACKING_PARAMS: [&str; 19] = [
    "fbclid",
    "gclid",
    "cmpid",
    "ref",
    "ref_src",
    "src",
    "partner",
    "ncid",
    "soc_src",
    "soc_trk",
    "xid",
    "mc_cid",
    "mc_eid",
    "_ga",
    "ocid",
    "guccounter",
    "sr_share",
    "taid",
    "cid",
];

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Canonical form of an article URL: https scheme, no `www.`, no fragment,
/// no tracking parameters, no trailing slash. Unparsable input is returned
/// trimmed so it still works as a (weaker) dedup key.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    if url.scheme() == "http" {
        // http -> https never fails for special schemes
        let _ = url.set_scheme("https");
    }
    if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
        if let Some(bare) = host.strip_prefix("www.") {
            let bare = bare.to_string();
            let _ = url.set_host(Some(&bare));
        }
    }
    url.set_fragment(None);
    if url.path() != "/" && url.path().ends_with('/') {
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(if path.is_empty() { "/" } else { &path });
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.to_string()
}

/// Lowercased host without a leading `www.`.
pub fn domain_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// `host == entry` or `host` is a subdomain of `entry`.
pub fn domain_matches(host: &str, entry: &str) -> bool {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let entry = entry.trim().to_ascii_lowercase();
    if entry.is_empty() {
        return false;
    }
    host == entry
        || host
            .strip_suffix(entry.as_str())
            .is_some_and(|rest| rest.ends_with('.'))
}
