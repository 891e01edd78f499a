//! Enhancement collaborator: bounded text generation used only to add
//! coverage when a category is sparse, and to merge near-duplicate bullets.
//!
//! Every implementation returns an empty list on failure instead of an error,
//! so the aggregator's fallback path is uniform. Call budgets are tracked by
//! the caller (`AggregationRun`); timeouts and input-size ceilings are applied
//! by the helpers at the bottom of this module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EnhancerSettings;
use crate::ingest::text::truncate_chars;
use crate::model::Category;

pub const ENV_ENHANCER_TEST_MODE: &str = "ENHANCER_TEST_MODE";

/// Similarity at or above which two bullets count as the same fact.
pub const NEAR_DUPLICATE_SIMILARITY: f64 = 0.85;

#[async_trait]
pub trait Enhancer: Send + Sync {
    /// New bullets for `category` drawn only from `excerpts`. `other_context`
    /// lists bullets already placed elsewhere that must not be repeated.
    async fn summarize(
        &self,
        category: Category,
        excerpts: &[String],
        date_iso: &str,
        other_context: &[String],
    ) -> Vec<String>;

    /// Same facts with near-duplicate phrasings merged.
    async fn semantic_dedupe(&self, bullets: &[String]) -> Vec<String>;

    /// `false` means callers should not spend budget on this enhancer.
    fn is_available(&self) -> bool {
        true
    }

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynEnhancer = Arc<dyn Enhancer>;

/// Factory: build an enhancer according to config and environment variables.
///
/// * If `ENHANCER_TEST_MODE=mock`, returns a deterministic mock.
/// * Else if `settings.enabled == false`, returns a disabled enhancer.
/// * Else builds the real provider (OpenAI); a missing key disables it.
pub fn build_enhancer_from_config(settings: &EnhancerSettings) -> DynEnhancer {
    if std::env::var(ENV_ENHANCER_TEST_MODE)
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockEnhancer::new(vec![
            "Mock Player (MOCK) \u{2014} Mock enhancement bullet (Mock)".to_string(),
        ]));
    }

    if !settings.enabled {
        return Arc::new(DisabledEnhancer);
    }

    match settings.provider.as_str() {
        "openai" => {
            let key = settings.resolved_api_key();
            if key.is_empty() {
                warn!(target: "enhance", "enhancer enabled but no API key; disabling");
                return Arc::new(DisabledEnhancer);
            }
            match OpenAiEnhancer::new(key, &settings.model, settings.timeout()) {
                Ok(e) => Arc::new(e),
                Err(e) => {
                    warn!(target: "enhance", error = %e, "could not build enhancer client; disabling");
                    Arc::new(DisabledEnhancer)
                }
            }
        }
        other => {
            warn!(target: "enhance", provider = other, "unknown enhancer provider; disabling");
            Arc::new(DisabledEnhancer)
        }
    }
}

// ------------------------------------------------------------
// Implementations
// ------------------------------------------------------------

/// Always unavailable; returns nothing.
pub struct DisabledEnhancer;

#[async_trait]
impl Enhancer for DisabledEnhancer {
    async fn summarize(
        &self,
        _category: Category,
        _excerpts: &[String],
        _date_iso: &str,
        _other_context: &[String],
    ) -> Vec<String> {
        Vec::new()
    }
    async fn semantic_dedupe(&self, _bullets: &[String]) -> Vec<String> {
        Vec::new()
    }
    fn is_available(&self) -> bool {
        false
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic enhancer for tests/local runs: `summarize` returns fixed
/// bullets, `semantic_dedupe` drops near-duplicates by edit distance.
pub struct MockEnhancer {
    fixed: Vec<String>,
    summarize_calls: AtomicUsize,
    dedupe_calls: AtomicUsize,
}

impl MockEnhancer {
    pub fn new(fixed: Vec<String>) -> Self {
        Self {
            fixed,
            summarize_calls: AtomicUsize::new(0),
            dedupe_calls: AtomicUsize::new(0),
        }
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn dedupe_calls(&self) -> usize {
        self.dedupe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enhancer for MockEnhancer {
    async fn summarize(
        &self,
        _category: Category,
        excerpts: &[String],
        _date_iso: &str,
        _other_context: &[String],
    ) -> Vec<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        if excerpts.is_empty() {
            return Vec::new();
        }
        self.fixed.clone()
    }

    async fn semantic_dedupe(&self, bullets: &[String]) -> Vec<String> {
        self.dedupe_calls.fetch_add(1, Ordering::SeqCst);
        merge_near_duplicates(bullets, NEAR_DUPLICATE_SIMILARITY)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Keep the first of every group of bullets whose normalized edit-distance
/// similarity reaches `threshold`.
pub fn merge_near_duplicates(bullets: &[String], threshold: f64) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(bullets.len());
    let mut kept_lower: Vec<String> = Vec::with_capacity(bullets.len());
    for b in bullets {
        let lower = b.to_lowercase();
        let dup = kept_lower
            .iter()
            .any(|k| strsim::normalized_levenshtein(k, &lower) >= threshold);
        if !dup {
            kept.push(b.clone());
            kept_lower.push(lower);
        }
    }
    kept
}

/// OpenAI provider (Chat Completions API).
pub struct OpenAiEnhancer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

const SUMMARIZE_SYSTEM: &str = "You write terse NFL personnel-status bullets. Use only facts stated in the excerpts. \
Return ONLY a JSON array of strings, one fact per string, formatted as \
\"Name (TEAM) \u{2014} fact (SOURCE)\". Return [] when nothing qualifies. \
Never repeat a fact listed under 'Already reported'.";

const DEDUPE_SYSTEM: &str = "You merge duplicate news bullets. Input is a JSON array of strings. \
Return ONLY a JSON array containing the input strings with bullets that describe the same fact \
reduced to the first one. Do not rewrite or add strings.";

impl OpenAiEnhancer {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("nfl-status-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Option<String> {
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
            max_tokens: 700,
        };
        let resp = match self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "enhance", error = %e, "enhancer request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!(target: "enhance", status = resp.status().as_u16(), "enhancer returned error status");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        body.choices.into_iter().next().map(|c| c.message.content)
    }
}

#[async_trait]
impl Enhancer for OpenAiEnhancer {
    async fn summarize(
        &self,
        category: Category,
        excerpts: &[String],
        date_iso: &str,
        other_context: &[String],
    ) -> Vec<String> {
        if excerpts.is_empty() {
            return Vec::new();
        }
        let user = summarize_prompt(category, excerpts, date_iso, other_context);
        let Some(content) = self.complete(SUMMARIZE_SYSTEM, &user).await else {
            return Vec::new();
        };
        parse_bullet_array(&content)
    }

    async fn semantic_dedupe(&self, bullets: &[String]) -> Vec<String> {
        if bullets.len() < 2 {
            return bullets.to_vec();
        }
        let Ok(input) = serde_json::to_string(bullets) else {
            return Vec::new();
        };
        let Some(content) = self.complete(DEDUPE_SYSTEM, &input).await else {
            return Vec::new();
        };
        parse_bullet_array(&content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn summarize_prompt(
    category: Category,
    excerpts: &[String],
    date_iso: &str,
    other_context: &[String],
) -> String {
    let mut out = format!("Category: {category}\nDate: {date_iso}\n");
    if !other_context.is_empty() {
        out.push_str("Already reported:\n");
        for b in other_context {
            out.push_str("- ");
            out.push_str(b);
            out.push('\n');
        }
    }
    out.push_str("Excerpts:\n");
    for (i, e) in excerpts.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, e));
    }
    out
}

/// Extract a JSON string array from model output (tolerates code fences and
/// chatter around the array). Anything unparsable yields an empty list.
pub fn parse_bullet_array(content: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (content.find('['), content.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(&content[start..=end]) {
        Ok(v) => v
            .iter()
            .map(|s| sanitize_bullet(s))
            .filter(|s| !s.is_empty())
            .collect(),
        Err(e) => {
            debug!(target: "enhance", error = %e, "enhancer output was not a string array");
            Vec::new()
        }
    }
}

/// Single line, collapsed whitespace, list markers removed.
pub fn sanitize_bullet(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_start_matches(['-', '*', '\u{2022}', ' '])
        .trim()
        .to_string()
}

// ------------------------------------------------------------
// Call-site limits
// ------------------------------------------------------------

/// Per-call limits applied by the caller around any enhancer.
#[derive(Debug, Clone, Copy)]
pub struct EnhancerLimits {
    pub timeout: Duration,
    pub max_excerpt_chars: usize,
    pub max_excerpts: usize,
}

impl From<&EnhancerSettings> for EnhancerLimits {
    fn from(s: &EnhancerSettings) -> Self {
        Self {
            timeout: s.timeout(),
            max_excerpt_chars: s.max_excerpt_chars,
            max_excerpts: s.max_excerpts,
        }
    }
}

impl Default for EnhancerLimits {
    fn default() -> Self {
        Self::from(&EnhancerSettings::default())
    }
}

/// `summarize` with excerpt truncation and a hard timeout. Timeouts yield
/// an empty list like any other failure.
pub async fn summarize_bounded(
    enhancer: &dyn Enhancer,
    limits: EnhancerLimits,
    category: Category,
    excerpts: &[String],
    date_iso: &str,
    other_context: &[String],
) -> Vec<String> {
    let bounded: Vec<String> = excerpts
        .iter()
        .take(limits.max_excerpts)
        .map(|e| truncate_chars(e, limits.max_excerpt_chars))
        .collect();
    match tokio::time::timeout(
        limits.timeout,
        enhancer.summarize(category, &bounded, date_iso, other_context),
    )
    .await
    {
        Ok(v) => v,
        Err(_) => {
            warn!(target: "enhance", %category, provider = enhancer.provider_name(), "summarize timed out");
            Vec::new()
        }
    }
}

/// `semantic_dedupe` with a hard timeout; empty on timeout.
pub async fn semantic_dedupe_bounded(
    enhancer: &dyn Enhancer,
    timeout: Duration,
    bullets: &[String],
) -> Vec<String> {
    match tokio::time::timeout(timeout, enhancer.semantic_dedupe(bullets)).await {
        Ok(v) => v,
        Err(_) => {
            warn!(target: "enhance", provider = enhancer.provider_name(), "semantic dedupe timed out");
            Vec::new()
        }
    }
}
