//! Token bucket with lazy refill

use crate::config::BucketConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Token bucket admission control for one source
///
/// Refill is lazy: every `take` first credits
/// `floor(elapsed / interval) * tokens_per_interval` tokens (capped at
/// capacity) when more than one interval has passed since the last refill,
/// then moves the refill mark to now.
///
/// # Examples
///
/// ```
/// use marketflow::config::BucketConfig;
/// use marketflow::core::ratelimit::TokenBucket;
///
/// let mut bucket = TokenBucket::new(BucketConfig {
///     capacity: 2,
///     tokens_per_interval: 1,
///     interval_ms: 60_000,
/// });
/// assert!(bucket.take());
/// assert!(bucket.take());
/// assert!(!bucket.take());
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    tokens_per_interval: u32,
    interval: Duration,
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(config: BucketConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    /// Creates a full bucket whose refill clock starts at `now`
    pub fn starting_at(config: BucketConfig, now: Instant) -> Self {
        Self {
            capacity: config.capacity,
            tokens_per_interval: config.tokens_per_interval,
            interval: Duration::from_millis(config.interval_ms.max(1)),
            tokens: config.capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed > self.interval {
            let intervals = elapsed.as_nanos() / self.interval.as_nanos();
            let added = intervals.saturating_mul(u128::from(self.tokens_per_interval));
            let room = u128::from(self.capacity - self.tokens.min(self.capacity));
            // room fits in u32, so the cast cannot truncate
            self.tokens += added.min(room) as u32;
            self.last_refill = now;
        }
    }

    /// Takes one token as of `now`; returns whether one was available
    pub fn take_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Takes one token; returns whether one was available
    pub fn take(&mut self) -> bool {
        self.take_at(Instant::now())
    }

    /// Tokens currently held (without refilling)
    pub fn available(&self) -> u32 {
        self.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: u32, tokens_per_interval: u32, interval_ms: u64) -> BucketConfig {
        BucketConfig {
            capacity,
            tokens_per_interval,
            interval_ms,
        }
    }

    #[test]
    fn test_fresh_bucket_allows_exactly_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(config(5, 1, 1000), start);
        for _ in 0..5 {
            assert!(bucket.take_at(start));
        }
        assert!(!bucket.take_at(start));
        assert_eq!(bucket.available(), 0);
    }

    #[test]
    fn test_refill_after_one_interval() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(config(4, 2, 1000), start);
        for _ in 0..4 {
            assert!(bucket.take_at(start));
        }

        let later = start + Duration::from_millis(1001);
        assert!(bucket.take_at(later));
        assert!(bucket.take_at(later));
        assert!(!bucket.take_at(later));
    }

    #[test]
    fn test_no_refill_at_exactly_one_interval() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(config(1, 1, 1000), start);
        assert!(bucket.take_at(start));
        assert!(!bucket.take_at(start + Duration::from_millis(1000)));
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(config(3, 2, 100), start);
        for _ in 0..3 {
            assert!(bucket.take_at(start));
        }

        let much_later = start + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(bucket.take_at(much_later));
        }
        assert!(!bucket.take_at(much_later));
    }

    #[test]
    fn test_multiple_intervals_credit_floor() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(config(10, 1, 100), start);
        for _ in 0..10 {
            assert!(bucket.take_at(start));
        }

        // 3.5 intervals credit 3 tokens
        let later = start + Duration::from_millis(350);
        for _ in 0..3 {
            assert!(bucket.take_at(later));
        }
        assert!(!bucket.take_at(later));
    }

    #[test]
    fn test_refill_mark_moves_to_now() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(config(1, 1, 100), start);
        assert!(bucket.take_at(start));

        // 150ms: one interval credited, mark moves to 150ms
        let t1 = start + Duration::from_millis(150);
        assert!(bucket.take_at(t1));

        // 220ms is only 70ms after the mark
        let t2 = start + Duration::from_millis(220);
        assert!(!bucket.take_at(t2));
    }
}
