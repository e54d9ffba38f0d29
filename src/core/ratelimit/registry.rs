//! Per-source limiter registry
//!
//! Owned by the orchestrator and shared with every source adapter. Each
//! source key gets its own bucket behind its own lock, so callers for one
//! source never contend with callers for another.

use super::bucket::TokenBucket;
use crate::config::{BucketConfig, RateLimitConfig};
use crate::log_throttled;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct SourceLimiter {
    bucket: Mutex<TokenBucket>,
    throttle_events: AtomicU64,
}

/// Token buckets keyed by source name, live for the process lifetime
pub struct RateLimiterRegistry {
    limiters: Mutex<HashMap<String, Arc<SourceLimiter>>>,
    defaults: BucketConfig,
    overrides: HashMap<String, BucketConfig>,
    poll_interval: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves plain counters behind; keep going
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RateLimiterRegistry {
    /// Creates an empty registry
    pub fn new(defaults: BucketConfig, poll_interval: Duration) -> Self {
        Self {
            limiters: Mutex::new(HashMap::new()),
            defaults,
            overrides: HashMap::new(),
            poll_interval,
        }
    }

    /// Creates a registry from the `[rate_limit]` section
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            limiters: Mutex::new(HashMap::new()),
            defaults: config.default,
            overrides: config.sources.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Registers a bucket for `key`; the first registration wins
    pub fn register(&self, key: &str, config: BucketConfig) {
        lock(&self.limiters)
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(SourceLimiter {
                    bucket: Mutex::new(TokenBucket::new(config)),
                    throttle_events: AtomicU64::new(0),
                })
            });
    }

    fn limiter(&self, key: &str) -> Arc<SourceLimiter> {
        let mut limiters = lock(&self.limiters);
        let config = self.overrides.get(key).copied().unwrap_or(self.defaults);
        limiters
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(SourceLimiter {
                    bucket: Mutex::new(TokenBucket::new(config)),
                    throttle_events: AtomicU64::new(0),
                })
            })
            .clone()
    }

    /// Non-blocking: consumes a token for `key` if one is available
    pub fn try_take(&self, key: &str) -> bool {
        let limiter = self.limiter(key);
        let taken = lock(&limiter.bucket).take();
        taken
    }

    /// Waits until a token for `key` is available and consumes it
    ///
    /// Each failed attempt counts one throttle event for `key` and sleeps one
    /// poll interval. Returns the number of failed attempts.
    pub async fn acquire(&self, key: &str) -> u64 {
        let limiter = self.limiter(key);
        let mut failed = 0u64;
        loop {
            let taken = lock(&limiter.bucket).take();
            if taken {
                return failed;
            }
            failed += 1;
            let total = limiter.throttle_events.fetch_add(1, Ordering::Relaxed) + 1;
            log_throttled!(key, total);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Throttle events recorded for `key` since the process started
    pub fn throttle_events(&self, key: &str) -> u64 {
        lock(&self.limiters)
            .get(key)
            .map(|limiter| limiter.throttle_events.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Throttle events across all keys
    pub fn total_throttle_events(&self) -> u64 {
        lock(&self.limiters)
            .values()
            .map(|limiter| limiter.throttle_events.load(Ordering::Relaxed))
            .sum()
    }

    /// Throttle events per key
    pub fn throttle_snapshot(&self) -> HashMap<String, u64> {
        lock(&self.limiters)
            .iter()
            .map(|(key, limiter)| (key.clone(), limiter.throttle_events.load(Ordering::Relaxed)))
            .collect()
    }
}

impl std::fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterRegistry")
            .field("keys", &lock(&self.limiters).keys().cloned().collect::<Vec<_>>())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
