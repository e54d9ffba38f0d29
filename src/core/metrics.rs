//! ETL metrics
//!
//! Counters and a fixed-bucket latency histogram, shared by the orchestrator
//! across runs. [`EtlMetrics::snapshot`] gives an exporter-neutral view.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Upper bounds of the latency buckets in milliseconds; the last bucket is
/// unbounded
pub const LATENCY_BUCKETS_MS: [u64; 8] = [100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

/// Error kinds counted in `errors_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKind {
    Source,
    SchemaDrift,
    Validation,
    Load,
    Quarantine,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Source => "source",
            ErrorKind::SchemaDrift => "schema_drift",
            ErrorKind::Validation => "validation",
            ErrorKind::Load => "load",
            ErrorKind::Quarantine => "quarantine",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, Default)]
struct LatencyHistogram {
    /// One slot per bound plus the overflow slot
    buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
    sum_ms: AtomicU64,
    count: AtomicU64,
}

impl LatencyHistogram {
    fn observe(&self, millis: u64) {
        let slot = LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| millis <= *bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(millis, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serializable view of the metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub rows_processed_total: u64,
    pub runs_total: u64,
    pub errors_total: BTreeMap<String, u64>,
    pub throttle_events_total: BTreeMap<String, u64>,
    pub run_latency_ms: HistogramSnapshot,
}

/// Cumulative histogram counts keyed by upper bound (`+Inf` last)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub buckets: Vec<(String, u64)>,
    pub sum: u64,
    pub count: u64,
}

/// Process-wide ETL metrics
#[derive(Debug, Default)]
pub struct EtlMetrics {
    rows_processed: AtomicU64,
    runs: AtomicU64,
    errors: Mutex<BTreeMap<ErrorKind, u64>>,
    throttle_events: Mutex<BTreeMap<String, u64>>,
    latency: LatencyHistogram,
}

impl EtlMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rows_processed(&self, rows: u64) {
        self.rows_processed.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_error(&self, kind: ErrorKind) {
        let mut errors = self.errors.lock().unwrap_or_else(|p| p.into_inner());
        *errors.entry(kind).or_insert(0) += 1;
    }

    pub fn add_throttle_events(&self, source: &str, events: u64) {
        if events == 0 {
            return;
        }
        let mut throttles = self.throttle_events.lock().unwrap_or_else(|p| p.into_inner());
        *throttles.entry(source.to_string()).or_insert(0) += events;
    }

    /// Records a finished run and its wall-clock latency
    pub fn observe_run(&self, latency_ms: u64) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.latency.observe(latency_ms);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let errors_total = self
            .errors
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(kind, count)| (kind.as_str().to_string(), *count))
            .collect();
        let throttle_events_total = self
            .throttle_events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();

        let mut cumulative = 0;
        let mut buckets = Vec::with_capacity(LATENCY_BUCKETS_MS.len() + 1);
        for (slot, counter) in self.latency.buckets.iter().enumerate() {
            cumulative += counter.load(Ordering::Relaxed);
            let label = LATENCY_BUCKETS_MS
                .get(slot)
                .map(|bound| bound.to_string())
                .unwrap_or_else(|| "+Inf".to_string());
            buckets.push((label, cumulative));
        }

        MetricsSnapshot {
            rows_processed_total: self.rows_processed.load(Ordering::Relaxed),
            runs_total: self.runs.load(Ordering::Relaxed),
            errors_total,
            throttle_events_total,
            run_latency_ms: HistogramSnapshot {
                buckets,
                sum: self.latency.sum_ms.load(Ordering::Relaxed),
                count: self.latency.count.load(Ordering::Relaxed),
            },
        }
    }
}
