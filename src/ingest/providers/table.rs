// src/ingest/providers/table.rs
//! Structured injury table (one page, one table per team).
//!
//! Rows carry name, status, note and an "updated" date that sits either in its
//! own column or as a `Mon DD:` prefix of the note. The team comes from a team
//! column when present, else from the team title right before the table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::classify::entities::{find_last_team, resolve_team};
use crate::fetch::Fetch;
use crate::ingest::dates::{is_stale, resolve_updated, split_note_date};
use crate::ingest::text::clean_fragment;
use crate::ingest::types::{LookbackWindow, SourceAdapter};
use crate::ingest::{canonical_url, ensure_metrics_described};
use crate::model::{EntityHints, NormalizedArticle};
use crate::sources::SourceDirectory;

/// Rows updated this recently get the 🆕 marker.
pub const FRESH_HOURS: i64 = 6;
const NEW_MARKER: &str = "\u{1F195} ";

static RE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("table regex"));
static RE_CAPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<caption\b[^>]*>(.*?)</caption>").expect("caption regex"));
static RE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("row regex"));
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t([hd])\b[^>]*>(.*?)</t[hd]>").expect("cell regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Team,
    Status,
    Note,
    Updated,
    Other,
}

fn column_for(header: &str) -> Column {
    let h = header.trim().trim_end_matches('.').to_ascii_lowercase();
    // "Est. Return Date" is a forecast, not an update stamp
    if h.contains("return") {
        return Column::Other;
    }
    match h.as_str() {
        "name" | "player" => Column::Name,
        "team" | "tm" => Column::Team,
        "status" | "game status" | "injury status" | "practice status" => Column::Status,
        "comment" | "comments" | "note" | "notes" | "details" | "injury" | "description" => {
            Column::Note
        }
        "date" | "updated" | "update" | "last update" | "last updated" => Column::Updated,
        _ => Column::Other,
    }
}

/// One parsed table row, before date resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    pub name: String,
    /// Team abbreviation when it could be resolved, raw text otherwise.
    pub team: Option<String>,
    pub status: String,
    pub note: String,
    pub updated: Option<String>,
}

/// Parse every table on the page. Rows without a name or status are skipped.
pub fn parse_rows(html: &str) -> Vec<TableRow> {
    let mut out = Vec::new();
    let mut prev_end = 0usize;

    for m in RE_TABLE.captures_iter(html) {
        let (Some(whole), Some(body)) = (m.get(0), m.get(1)) else {
            continue;
        };
        let heading_team = RE_CAPTION
            .captures(body.as_str())
            .and_then(|c| find_last_team(&clean_fragment(&c[1])))
            .or_else(|| find_last_team(&clean_fragment(&html[prev_end..whole.start()])))
            .map(|t| t.abbr.to_string());
        prev_end = whole.end();

        let mut columns: Option<Vec<Column>> = None;
        for row in RE_ROW.captures_iter(body.as_str()) {
            let cells: Vec<(bool, String)> = RE_CELL
                .captures_iter(&row[1])
                .map(|c| (&c[1] == "h" || &c[1] == "H", clean_fragment(&c[2])))
                .collect();
            if cells.is_empty() {
                continue;
            }
            let Some(cols) = columns.as_ref() else {
                if cells.iter().any(|(is_header, _)| *is_header) {
                    columns = Some(cells.iter().map(|(_, t)| column_for(t)).collect());
                }
                continue;
            };
            if let Some(r) = row_from_cells(cols, &cells, heading_team.as_deref()) {
                out.push(r);
            }
        }
    }
    out
}

fn row_from_cells(
    cols: &[Column],
    cells: &[(bool, String)],
    heading_team: Option<&str>,
) -> Option<TableRow> {
    let mut row = TableRow::default();
    let mut note_taken = false;
    for (col, (_, text)) in cols.iter().zip(cells) {
        match col {
            Column::Name if row.name.is_empty() => row.name = text.clone(),
            Column::Team if !text.is_empty() => {
                row.team = Some(
                    resolve_team(text)
                        .map(|t| t.abbr.to_string())
                        .unwrap_or_else(|| text.to_ascii_uppercase()),
                )
            }
            Column::Status if row.status.is_empty() => row.status = text.clone(),
            Column::Note if !note_taken => {
                row.note = text.clone();
                note_taken = true;
            }
            Column::Updated if !text.is_empty() => row.updated = Some(text.clone()),
            _ => {}
        }
    }
    if row.name.is_empty() || row.status.is_empty() {
        return None;
    }
    if row.team.is_none() {
        row.team = heading_team.map(str::to_string);
    }
    if let Some((date, rest)) = split_note_date(&row.note) {
        if row.updated.is_none() {
            row.updated = Some(date);
        }
        row.note = rest;
    }
    Some(row)
}

/// `Name (TEAM) — Status (note) · Updated Aug 14 (SOURCE)`.
pub fn format_row_bullet(row: &TableRow, updated: &str, source: &str, fresh: bool) -> String {
    let marker = if fresh { NEW_MARKER } else { "" };
    let subject = match &row.team {
        Some(t) => format!("{} ({t})", row.name),
        None => row.name.clone(),
    };
    let note = row.note.trim().trim_end_matches('.');
    let note = if note.is_empty() {
        String::new()
    } else {
        format!(" ({note})")
    };
    format!(
        "{marker}{subject} \u{2014} {}{note} \u{00B7} Updated {updated} ({source})",
        row.status
    )
}

fn slug(parts: &[&str]) -> String {
    let joined = parts.join(" ").to_ascii_lowercase();
    joined
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Rows inside the window (and under the staleness ceiling) as articles with
/// finished bullets. Rows whose date cannot be resolved are dropped.
pub fn rows_to_articles(
    rows: &[TableRow],
    page_url: &str,
    source: &str,
    window: LookbackWindow,
) -> Vec<NormalizedArticle> {
    let page = canonical_url(page_url);
    let mut out = Vec::new();
    for row in rows {
        let Some(resolved) = row
            .updated
            .as_deref()
            .and_then(|u| resolve_updated(u, window.now))
        else {
            counter!("ingest_adapter_errors_total", "adapter" => "table").increment(1);
            debug!(target: "ingest", name = %row.name, "table row without a usable date");
            continue;
        };
        if !window.contains(resolved.at) || is_stale(resolved.at, window.now) {
            continue;
        }
        let fresh = window.now - resolved.at <= ChronoDuration::hours(FRESH_HOURS);
        let team = row.team.as_deref().unwrap_or("");
        out.push(NormalizedArticle {
            canonical_url: format!("{page}#{}", slug(&[&row.name, team])),
            source: source.to_string(),
            title: format!("{} {}", row.name, row.status),
            text: row.note.clone(),
            published_at: resolved.at,
            hints: EntityHints {
                person: Some(row.name.clone()),
                team: row.team.clone(),
            },
            bullet: Some(format_row_bullet(row, &resolved.display, source, fresh)),
        });
    }
    out
}

pub struct InjuryTableAdapter {
    fetcher: Arc<dyn Fetch>,
    page_url: String,
    timeout: Duration,
    directory: Arc<SourceDirectory>,
}

impl InjuryTableAdapter {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        page_url: String,
        timeout: Duration,
        directory: Arc<SourceDirectory>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            fetcher,
            page_url,
            timeout,
            directory,
        }
    }
}

#[async_trait]
impl SourceAdapter for InjuryTableAdapter {
    async fn fetch_recent(&self, window: LookbackWindow) -> Result<Vec<NormalizedArticle>> {
        let html = self
            .fetcher
            .fetch(&self.page_url, self.timeout)
            .await
            .with_context(|| format!("fetching injury table {}", self.page_url))?;

        let t0 = Instant::now();
        let rows = parse_rows(&html);
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        if rows.is_empty() {
            counter!("ingest_adapter_errors_total", "adapter" => "table").increment(1);
            warn!(target: "ingest", url = %self.page_url, "no table rows found");
            return Ok(Vec::new());
        }

        let source = self.directory.short_name(&self.page_url);
        let out = rows_to_articles(&rows, &self.page_url, &source, window);
        counter!("ingest_articles_total", "adapter" => "table").increment(out.len() as u64);
        info!(
            target: "ingest",
            rows = rows.len(),
            kept = out.len(),
            hours = window.hours,
            "injury table parsed"
        );
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "injury-table"
    }
}
