// src/config/enhancer.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_calls() -> u32 {
    2
}
fn default_timeout_ms() -> u64 {
    20_000
}
fn default_excerpt_chars() -> usize {
    600
}
fn default_max_excerpts() -> usize {
    12
}
fn default_api_key() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancerSettings {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" (case-insensitive); anything else disables enhancement.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard ceiling of enhancement transitions per aggregation run.
    #[serde(default = "default_max_calls")]
    pub max_calls_per_run: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Each excerpt is truncated to this many characters before submission.
    #[serde(default = "default_excerpt_chars")]
    pub max_excerpt_chars: usize,
    #[serde(default = "default_max_excerpts")]
    pub max_excerpts: usize,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

impl Default for EnhancerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            max_calls_per_run: default_max_calls(),
            timeout_ms: default_timeout_ms(),
            max_excerpt_chars: default_excerpt_chars(),
            max_excerpts: default_max_excerpts(),
            api_key: default_api_key(),
        }
    }
}

impl EnhancerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the `"ENV"` indirection. Missing keys resolve to an empty string,
    /// which the provider treats as "unavailable".
    pub fn resolved_api_key(&self) -> String {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                _ => String::new(),
            }
        } else {
            self.api_key.trim().to_string()
        }
    }

    pub(crate) fn sanitize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();
        if self.max_excerpt_chars == 0 {
            self.max_excerpt_chars = default_excerpt_chars();
        }
        if self.max_excerpts == 0 {
            self.max_excerpts = default_max_excerpts();
        }
        if self.timeout_ms == 0 {
            self.timeout_ms = default_timeout_ms();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_key_is_kept() {
        let s = EnhancerSettings {
            api_key: "  sk-test ".into(),
            ..Default::default()
        };
        assert_eq!(s.resolved_api_key(), "sk-test");
    }

    #[test]
    fn unknown_provider_resolves_empty_env_key() {
        let s = EnhancerSettings {
            provider: "claude".into(),
            ..Default::default()
        };
        assert_eq!(s.resolved_api_key(), "");
    }

    #[test]
    fn sanitize_normalizes_provider_and_zeroes() {
        let mut s = EnhancerSettings {
            provider: " OpenAI ".into(),
            max_excerpt_chars: 0,
            timeout_ms: 0,
            ..Default::default()
        };
        s.sanitize();
        assert_eq!(s.provider, "openai");
        assert_eq!(s.max_excerpt_chars, 600);
        assert_eq!(s.timeout(), Duration::from_secs(20));
    }
}
