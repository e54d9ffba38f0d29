//! Shared fetch policy for the remote sources
//!
//! Every attempt first waits for a token from the source's bucket. Retryable
//! failures (429, 5xx, transport timeout) are retried with doubling backoff;
//! anything else, or running out of retries, falls back to the cached
//! snapshot when one exists.

use super::cache::SnapshotCache;
use crate::config::RetryConfig;
use crate::core::ratelimit::RateLimiterRegistry;
use crate::domain::{MarketflowError, Result, SourceError, SourceKind};
use crate::log_retry_attempt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Retry schedule for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Wait before the first retry
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Wait before the `retry`-th retry (1-based): `initial * 2^(retry-1)`
    pub fn backoff_for(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(31) as u32;
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

/// Items returned by [`RemoteFetcher::fetch_items`]
#[derive(Debug, Clone)]
pub struct RemoteItems {
    pub items: Vec<Value>,
    /// Served from the last-known-good snapshot
    pub from_cache: bool,
    /// Requests actually sent
    pub attempts: usize,
    /// Backoff slept between attempts
    pub waited: Duration,
    /// Why the live fetch failed, when served from cache
    pub fallback_reason: Option<String>,
}

/// Rate-limited, retrying JSON fetcher with a snapshot fallback
pub struct RemoteFetcher {
    source: SourceKind,
    client: Client,
    limiter: Arc<RateLimiterRegistry>,
    retry: RetryPolicy,
    cache: SnapshotCache,
}

impl RemoteFetcher {
    /// Creates a fetcher with its own HTTP client
    pub fn new(
        source: SourceKind,
        timeout: Duration,
        retry: RetryPolicy,
        limiter: Arc<RateLimiterRegistry>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("marketflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                MarketflowError::Configuration(format!(
                    "Failed to build HTTP client for {source}: {e}"
                ))
            })?;

        Ok(Self {
            source,
            client,
            limiter,
            retry,
            cache: SnapshotCache::new(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Fetches and decodes the item list, applying the retry and cache policy
    ///
    /// `build` is called once per attempt to produce a fresh request.
    pub async fn fetch_items<F>(&self, build: F) -> Result<RemoteItems>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0usize;
        let mut waited = Duration::ZERO;
        let mut attempts = 0usize;

        let failure = loop {
            self.limiter.acquire(self.source.as_str()).await;
            attempts += 1;

            match self.attempt(&build).await {
                Ok(items) => {
                    self.cache.store(items.clone());
                    tracing::debug!(
                        source = %self.source,
                        items = items.len(),
                        attempts,
                        "Fetched source payload"
                    );
                    return Ok(RemoteItems {
                        items,
                        from_cache: false,
                        attempts,
                        waited,
                        fallback_reason: None,
                    });
                }
                Err(err) if err.is_retryable() && retries < self.retry.max_retries => {
                    retries += 1;
                    let backoff = self.retry.backoff_for(retries);
                    log_retry_attempt!(
                        self.source,
                        attempts + 1,
                        self.retry.max_retries + 1,
                        backoff.as_millis() as u64,
                        err
                    );
                    tokio::time::sleep(backoff).await;
                    waited += backoff;
                }
                Err(err) => break err,
            }
        };

        match self.cache.get() {
            Some(snapshot) => {
                tracing::warn!(
                    source = %self.source,
                    attempts,
                    error = %failure,
                    cached_items = snapshot.items.len(),
                    cached_at = %snapshot.fetched_at,
                    "Source unavailable, serving last-known-good snapshot"
                );
                Ok(RemoteItems {
                    items: snapshot.items,
                    from_cache: true,
                    attempts,
                    waited,
                    fallback_reason: Some(failure.to_string()),
                })
            }
            None => Err(SourceError::Exhausted {
                source_name: self.source.to_string(),
                attempts,
                last_error: failure.to_string(),
            }
            .into()),
        }
    }

    async fn attempt<F>(&self, build: &F) -> std::result::Result<Vec<Value>, SourceError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let source_name = self.source.to_string();

        let response = build(&self.client).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    source_name: source_name.clone(),
                    message: e.to_string(),
                }
            } else {
                SourceError::ConnectionFailed {
                    source_name: source_name.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&source_name, status, body));
        }

        let payload: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    source_name: source_name.clone(),
                    message: e.to_string(),
                }
            } else {
                SourceError::InvalidPayload {
                    source_name: source_name.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        extract_items(&source_name, payload)
    }
}

fn classify_status(source_name: &str, status: StatusCode, body: String) -> SourceError {
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        body
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        SourceError::RateLimited {
            source_name: source_name.to_string(),
            message,
        }
    } else if status.is_server_error() {
        SourceError::ServerError {
            source_name: source_name.to_string(),
            status: status.as_u16(),
            message,
        }
    } else {
        SourceError::ClientError {
            source_name: source_name.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

/// Accepts either a top-level array or an object wrapping it in `data`
pub fn extract_items(source_name: &str, payload: Value) -> std::result::Result<Vec<Value>, SourceError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(SourceError::InvalidPayload {
                source_name: source_name.to_string(),
                message: "expected an array or an object with a 'data' array".to_string(),
            }),
        },
        other => Err(SourceError::InvalidPayload {
            source_name: source_name.to_string(),
            message: format!("expected an array, got {}", type_name(&other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
