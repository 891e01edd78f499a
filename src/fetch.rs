// src/fetch.rs
//! Rate-limited HTTP fetcher: the only component that talks to the network.
//!
//! - A shared `Semaphore` bounds simultaneous requests (default 4). A permit is
//!   held for one attempt only and released while backing off, so a retrying
//!   fetch never blocks other in-flight fetches.
//! - Retryable failures (timeout, connect/reset, body read, 429/502/503/504) are
//!   retried with exponential backoff: `min(base * 2^(n-1), cap) + jitter`.
//! - Everything else returns a `FetchError` immediately.

use async_trait::async_trait;
use metrics::counter;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::FetchSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },
    #[error("connection failed for {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed reading body of {url}: {reason}")]
    Body { url: String, reason: String },
    #[error("unparsable response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("invalid url {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connect { .. } | FetchError::Body { .. } => {
                true
            }
            FetchError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            FetchError::Decode { .. } | FetchError::InvalidUrl { .. } => false,
        }
    }
}

/// Seam used by adapters so they can run against fixtures in tests.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Retry/backoff policy, copied out of `FetchSettings` at construction.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_settings(s: &FetchSettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter: Duration::from_millis(s.jitter_ms),
        }
    }

    /// Deterministic part of the delay before retry number `attempt` (1-based).
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_backoff(attempt) + Duration::from_millis(extra)
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    policy: RetryPolicy,
    requests: AtomicU64,
}

impl Fetcher {
    pub fn new(settings: &FetchSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .connect_timeout(Duration::from_secs(5))
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(settings.concurrency.max(1))),
            policy: RetryPolicy::from_settings(settings),
            requests: AtomicU64::new(0),
        })
    }

    /// Total attempts issued so far (diagnostics only).
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt_once(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        // Semaphore is never closed; a failure here would only mean shutdown.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Connect {
                url: url.to_string(),
                reason: "fetcher shut down".to_string(),
            })?;
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("fetch_attempts_total").increment(1);

        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|e| {
            if e.is_decode() {
                FetchError::Decode {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                map_reqwest_error(url, &e)
            }
        })
    }
}

fn map_reqwest_error(url: &str, e: &reqwest::Error) -> FetchError {
    let url = url.to_string();
    if e.is_timeout() {
        FetchError::Timeout { url }
    } else if e.is_builder() {
        FetchError::InvalidUrl { url }
    } else if e.is_decode() {
        FetchError::Decode {
            url,
            reason: e.to_string(),
        }
    } else if e.is_body() {
        FetchError::Body {
            url,
            reason: e.to_string(),
        }
    } else {
        FetchError::Connect {
            url,
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Fetch for Fetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        if url::Url::parse(url).is_err() {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }
        let t0 = Instant::now();
        let mut attempt = 1u32;
        loop {
            match self.attempt_once(url, timeout).await {
                Ok(body) => {
                    debug!(
                        target: "fetch",
                        url, attempt, bytes = body.len(),
                        ms = t0.elapsed().as_millis() as u64,
                        "fetched"
                    );
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff_with_jitter(attempt);
                    debug!(
                        target: "fetch",
                        url, attempt, error = %e, delay_ms = delay.as_millis() as u64,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(target: "fetch", url, attempt, error = %e, "fetch failed");
                    counter!("fetch_failures_total").increment(1);
                    return Err(e);
                }
            }
        }
    }
}
