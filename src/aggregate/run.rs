// src/aggregate/run.rs
//! Per-invocation state: run label, reference time, shared enhancement budget,
//! memoized adapter outputs and the fallback log. Nothing here outlives one
//! `get_categorized_results` call.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use crate::ingest::{AdapterKind, LookbackWindow};
use crate::model::{Category, NormalizedArticle};

/// Publication slot. Drives the base lookback and the widened windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLabel {
    Morning,
    Afternoon,
    Evening,
}

impl RunLabel {
    /// Case-insensitive; `midday` is the afternoon slot, anything unknown is
    /// treated as morning (the widest window).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "afternoon" | "midday" | "noon" => RunLabel::Afternoon,
            "evening" | "night" => RunLabel::Evening,
            _ => RunLabel::Morning,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunLabel::Morning => "morning",
            RunLabel::Afternoon => "afternoon",
            RunLabel::Evening => "evening",
        }
    }

    pub fn base_hours(self) -> u32 {
        match self {
            RunLabel::Morning => 12,
            RunLabel::Afternoon => 6,
            RunLabel::Evening => 8,
        }
    }

    /// Second-pass lookback before the `2 × base` floor is applied.
    pub fn widened_hours(self, category: Category) -> u32 {
        match (self, category) {
            (RunLabel::Morning, Category::Breaking) => 24,
            (RunLabel::Morning, _) => 48,
            (RunLabel::Afternoon, Category::Breaking) => 12,
            (RunLabel::Afternoon, _) => 24,
            (RunLabel::Evening, Category::Breaking) => 18,
            (RunLabel::Evening, _) => 36,
        }
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type MemoCell = Arc<OnceCell<Vec<NormalizedArticle>>>;

pub struct AggregationRun {
    pub label: RunLabel,
    pub now: DateTime<Utc>,
    pub base_hours: u32,
    budget: AtomicU32,
    memo: Mutex<HashMap<(AdapterKind, u32), MemoCell>>,
    fallbacks: Mutex<Vec<(Category, String)>>,
}

impl AggregationRun {
    pub fn new(label: RunLabel, now: DateTime<Utc>, base_hours: u32, enhancer_budget: u32) -> Self {
        Self {
            label,
            now,
            base_hours: base_hours.max(1),
            budget: AtomicU32::new(enhancer_budget),
            memo: Mutex::new(HashMap::new()),
            fallbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn window(&self, hours: u32) -> LookbackWindow {
        LookbackWindow::new(hours, self.now)
    }

    /// `max(widened table value, 2 × base)`.
    pub fn widened_hours(&self, category: Category) -> u32 {
        self.label
            .widened_hours(category)
            .max(self.base_hours.saturating_mul(2))
    }

    /// Take one unit of the shared enhancement budget. Never goes below zero.
    pub fn try_take_budget(&self) -> bool {
        self.budget
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok()
    }

    pub fn remaining_budget(&self) -> u32 {
        self.budget.load(Ordering::Acquire)
    }

    /// Cell for one adapter output at one window size. Categories sharing an
    /// adapter at the same window get the same cell, so the adapter runs once.
    pub(crate) fn memo_cell(&self, kind: AdapterKind, hours: u32) -> MemoCell {
        match self.memo.lock() {
            Ok(mut map) => map.entry((kind, hours)).or_default().clone(),
            // poisoned: fall back to an unshared cell
            Err(_) => Arc::new(OnceCell::new()),
        }
    }

    pub fn record_fallback(&self, category: Category, entry: String) {
        if let Ok(mut v) = self.fallbacks.lock() {
            v.push((category, entry));
        }
    }

    /// Fallback log in category order, whatever order the categories finished in.
    pub fn fallbacks(&self) -> Vec<String> {
        let mut entries = self.fallbacks.lock().map(|v| v.clone()).unwrap_or_default();
        entries.sort_by_key(|(c, _)| *c);
        entries.into_iter().map(|(_, e)| e).collect()
    }
}
