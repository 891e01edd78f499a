// src/cache.rs
//! Opportunistic read-through cache for adapter outputs.
//!
//! Entries are immutable JSON snapshots addressed by a composite key
//! (subject + category/adapter + window). Any error is treated as a miss by
//! callers, and a lost write only costs a refetch.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache entry could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl_minutes: u64) -> Result<(), CacheError>;
}

/// Short, non-reversible id for logs (12 hex chars).
pub(crate) fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Composite cache key: `digest:<scope>:<sha256 of the parts>`.
pub fn cache_key(scope: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("digest:{scope}:{hex}")
}

/// Process-local TTL map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut map = self
            .entries
            .lock()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        match map.get(key) {
            Some((expires, value)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl_minutes: u64) -> Result<(), CacheError> {
        if ttl_minutes == 0 {
            return Ok(());
        }
        let expires = Instant::now() + Duration::from_secs(ttl_minutes.saturating_mul(60));
        let mut map = self
            .entries
            .lock()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        map.retain(|_, (exp, _)| *exp > Instant::now());
        map.insert(key.to_string(), (expires, value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let c = MemoryCache::new();
        c.set("k", "v".into(), 5).await.unwrap();
        assert_eq!(c.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(c.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let c = MemoryCache::new();
        c.set("k", "v".into(), 0).await.unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn keys_are_stable_and_scoped() {
        let a = cache_key("adapter", &["table", "12"]);
        let b = cache_key("adapter", &["table", "12"]);
        let c = cache_key("adapter", &["table1", "2"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("digest:adapter:"));
        assert_eq!(anon_hash("x").len(), 12);
    }
}
