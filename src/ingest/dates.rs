// src/ingest/dates.rs
//! Date handling for feeds and scraped tables.
//!
//! Feed timestamps are RFC 2822 (RSS) or RFC 3339 (Atom). Tables carry loose
//! month/day strings ("Aug 14", "Thu, Aug 14", "8/14") without a year; those
//! are resolved against the run's `now`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// Rows/articles older than this are dropped whatever the lookback says.
pub const STALENESS_CEILING_DAYS: i64 = 30;

/// A year-less date more than this far in the future is assumed to be from
/// the previous year.
const FUTURE_ROLLBACK_DAYS: i64 = 2;

/// RSS/Atom timestamp → UTC. Tries RFC 2822 (`time`, then chrono's more
/// lenient parser), RFC 3339, and a bare `YYYY-MM-DD HH:MM:SS`.
pub fn parse_feed_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Utc.timestamp_opt(dt.unix_timestamp(), 0).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|n| Utc.from_utc_datetime(&n))
}

/// A table date resolved to a point in time plus its display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    pub at: DateTime<Utc>,
    /// "Aug 14"
    pub display: String,
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let key = lower.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == key)
        .map(|i| i as u32 + 1)
}

static RE_MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b")
        .expect("month-day regex")
});
static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").expect("numeric date regex")
});
static RE_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date regex"));
static RE_NOTE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*((?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2}):\s*")
        .expect("note prefix regex")
});

/// Resolve a table "updated" value. Date-only values mean the end of that
/// day, capped at `now`, so a row updated "today" is never in the future.
///
/// Heuristic: when no year is given and the date lands more than two days
/// after `now`, the previous year is assumed (a "Dec 30" row read on Jan 2).
/// This guards against obvious misreads only; it is not a general parser.
pub fn resolve_updated(raw: &str, now: DateTime<Utc>) -> Option<ResolvedDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(dt) = parse_feed_date(raw) {
        return Some(ResolvedDate {
            at: dt.min(now),
            display: dt.format("%b %-d").to_string(),
        });
    }

    let (month, day, year) = if let Some(c) = RE_ISO_DATE.captures(raw) {
        (
            c[2].parse::<u32>().ok()?,
            c[3].parse::<u32>().ok()?,
            Some(c[1].parse::<i32>().ok()?),
        )
    } else if let Some(c) = RE_MONTH_DAY.captures(raw) {
        (
            month_number(&c[1])?,
            c[2].parse::<u32>().ok()?,
            c.get(3).and_then(|y| y.as_str().parse::<i32>().ok()),
        )
    } else if let Some(c) = RE_NUMERIC.captures(raw) {
        let year = c.get(3).and_then(|y| y.as_str().parse::<i32>().ok()).map(|y| {
            if y < 100 {
                2000 + y
            } else {
                y
            }
        });
        (c[1].parse::<u32>().ok()?, c[2].parse::<u32>().ok()?, year)
    } else {
        return None;
    };

    let date = match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day)?,
        None => {
            let this_year = NaiveDate::from_ymd_opt(now.year(), month, day)?;
            if this_year > now.date_naive() + Duration::days(FUTURE_ROLLBACK_DAYS) {
                NaiveDate::from_ymd_opt(now.year() - 1, month, day)?
            } else {
                this_year
            }
        }
    };
    let end_of_day = Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59)?);
    Some(ResolvedDate {
        at: end_of_day.min(now),
        display: date.format("%b %-d").to_string(),
    })
}

/// Split a `Mon DD:` date prefix off a table note.
/// `"Aug 14: Limited in practice"` → `Some(("Aug 14", "Limited in practice"))`.
pub fn split_note_date(note: &str) -> Option<(String, String)> {
    let c = RE_NOTE_PREFIX.captures(note)?;
    let whole = c.get(0)?;
    Some((c[1].to_string(), note[whole.end()..].trim().to_string()))
}

/// Explicit dates written out in text ("August 2, 2025", "2025-08-02").
/// Used to catch recycled/evergreen pages whose feed timestamp is fresh.
pub fn explicit_dates(text: &str) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    for c in RE_MONTH_DAY.captures_iter(text) {
        let (Some(m), Some(d), Some(y)) = (
            month_number(&c[1]),
            c[2].parse::<u32>().ok(),
            c.get(3).and_then(|y| y.as_str().parse::<i32>().ok()),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            out.push(date);
        }
    }
    for c in RE_ISO_DATE.captures_iter(text) {
        let date = c[1]
            .parse::<i32>()
            .ok()
            .zip(c[2].parse::<u32>().ok())
            .zip(c[3].parse::<u32>().ok())
            .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d));
        if let Some(date) = date {
            out.push(date);
        }
    }
    out
}

/// Older than the staleness ceiling relative to `now`.
pub fn is_stale(ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - ts > Duration::days(STALENESS_CEILING_DAYS)
}
