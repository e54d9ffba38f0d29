//! Shared fixtures for the pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use marketflow::adapters::database::{InMemoryStore, MarketStore, UpsertOutcome};
use marketflow::config::{MarketflowConfig, RetryConfig};
use marketflow::domain::{
    CanonicalRecord, Checkpoint, QuarantinedRecord, RawRecord, RecordKey, Result, Run, RunId,
    SchemaVersion, SourceKind, StoreError,
};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const CANONICAL_HEADER: &str = "ticker,price_usd,tx_volume,time";

/// Writes a CSV file with `header` followed by `rows`
pub fn csv_file(header: &str, rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp csv");
    writeln!(file, "{header}").expect("write header");
    for row in rows {
        writeln!(file, "{row}").expect("write row");
    }
    file.flush().expect("flush csv");
    file
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 1,
        initial_backoff_ms: 1,
    }
}

/// Configuration reading the two remote sources from `server_url` and the
/// file source from `csv_path`
pub fn config_for(server_url: &str, csv_path: &str) -> MarketflowConfig {
    let mut config = MarketflowConfig::default();
    config.sources.assets.base_url = server_url.to_string();
    config.sources.assets.limit = 2;
    config.sources.assets.timeout_seconds = 2;
    config.sources.assets.retry = fast_retry();
    config.sources.tickers.base_url = server_url.to_string();
    config.sources.tickers.timeout_seconds = 2;
    config.sources.tickers.retry = fast_retry();
    config.sources.csv.path = csv_path.to_string();
    config
}

/// Configuration with only the file source enabled
pub fn csv_only_config(csv_path: &str) -> MarketflowConfig {
    let mut config = MarketflowConfig::default();
    config.sources.assets.enabled = false;
    config.sources.tickers.enabled = false;
    config.sources.csv.path = csv_path.to_string();
    config
}

pub const ASSETS_BODY: &str = r#"{"data":[
    {"symbol":"BTC","priceUsd":"68000.5","volumeUsd24Hr":"1200.5","timestamp":1728561600000},
    {"symbol":"ETH","priceUsd":"3500.25","volumeUsd24Hr":"800","timestamp":1728561600000}
]}"#;

pub const TICKERS_BODY: &str = r#"[
    {"pair":"SOL-USD","last":"150.2","volume_24h":"10","timestamp":1728561600},
    {"pair":"ADA-USD","last":"0.35","volume_24h":"99","timestamp":1728561600}
]"#;

pub const CSV_ROWS: [&str; 2] = ["DOGE,0.11,5000,1728561600", "XRP,0.52,700,1728561600"];

/// Store that delegates to an in-memory store but can reject record upserts
#[derive(Default)]
pub struct RejectingStore {
    inner: InMemoryStore,
    reject_upserts: AtomicBool,
}

impl RejectingStore {
    pub fn rejecting() -> Self {
        let store = Self::default();
        store.set_rejecting(true);
        store
    }

    pub fn set_rejecting(&self, reject: bool) {
        self.reject_upserts.store(reject, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl MarketStore for RejectingStore {
    async fn test_connection(&self) -> Result<()> {
        self.inner.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.inner.ensure_schema().await
    }

    async fn upsert_records(&self, records: &[CanonicalRecord]) -> Result<UpsertOutcome> {
        if self.reject_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected("records table is read-only".to_string()).into());
        }
        self.inner.upsert_records(records).await
    }

    async fn insert_raw(&self, records: &[RawRecord]) -> Result<usize> {
        self.inner.insert_raw(records).await
    }

    async fn insert_quarantined(&self, records: &[QuarantinedRecord]) -> Result<usize> {
        self.inner.insert_quarantined(records).await
    }

    async fn create_run(&self, run: &Run) -> Result<()> {
        self.inner.create_run(run).await
    }

    async fn save_run(&self, run: &Run) -> Result<()> {
        self.inner.save_run(run).await
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>> {
        self.inner.get_run(run_id).await
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
        self.inner.list_runs(limit).await
    }

    async fn latest_unfinished_run(&self, excluding: &RunId) -> Result<Option<Run>> {
        self.inner.latest_unfinished_run(excluding).await
    }

    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.inner.create_checkpoint(checkpoint).await
    }

    async fn latest_completed_checkpoint(
        &self,
        run_id: &RunId,
        source: SourceKind,
    ) -> Result<Option<Checkpoint>> {
        self.inner.latest_completed_checkpoint(run_id, source).await
    }

    async fn checkpoints_for_run(&self, run_id: &RunId) -> Result<Vec<Checkpoint>> {
        self.inner.checkpoints_for_run(run_id).await
    }

    async fn create_schema_version(&self, version: &SchemaVersion) -> Result<()> {
        self.inner.create_schema_version(version).await
    }

    async fn latest_schema_version(&self, source: SourceKind) -> Result<Option<SchemaVersion>> {
        self.inner.latest_schema_version(source).await
    }

    async fn quarantined_for_run(&self, run_id: &RunId) -> Result<Vec<QuarantinedRecord>> {
        self.inner.quarantined_for_run(run_id).await
    }

    async fn find_record(&self, key: &RecordKey) -> Result<Option<CanonicalRecord>> {
        self.inner.find_record(key).await
    }

    async fn count_records(&self) -> Result<u64> {
        self.inner.count_records().await
    }

    fn backend_name(&self) -> &str {
        "rejecting"
    }
}

pub fn shared<S: MarketStore + 'static>(store: S) -> Arc<S> {
    Arc::new(store)
}
