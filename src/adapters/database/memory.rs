//! In-memory store
//!
//! Document-store semantics behind a mutex. Used as the default backend and
//! by the test suites.

use super::traits::{MarketStore, UpsertOutcome};
use crate::domain::{
    CanonicalRecord, Checkpoint, CheckpointStatus, QuarantinedRecord, RawRecord, RecordKey,
    Result, Run, RunId, RunStatus, SchemaVersion, SourceKind, StoreError,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Collections {
    records: BTreeMap<RecordKey, CanonicalRecord>,
    raw: Vec<RawRecord>,
    quarantined: Vec<QuarantinedRecord>,
    /// Insertion order
    runs: Vec<Run>,
    checkpoints: Vec<Checkpoint>,
    schema_versions: Vec<SchemaVersion>,
}

/// Store keeping every collection in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Collections>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Raw records appended so far
    pub fn raw_count(&self) -> usize {
        self.lock().raw.len()
    }

    /// Schema versions recorded for a source, oldest first
    pub fn schema_versions(&self, source: SourceKind) -> Vec<SchemaVersion> {
        self.lock()
            .schema_versions
            .iter()
            .filter(|v| v.source == source)
            .cloned()
            .collect()
    }

    /// Snapshot of every canonical record ordered by key
    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.lock().records.values().cloned().collect()
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_records(&self, records: &[CanonicalRecord]) -> Result<UpsertOutcome> {
        let mut inner = self.lock();
        let mut outcome = UpsertOutcome::default();

        for record in records {
            match inner.records.insert(record.key(), record.clone()) {
                None => outcome.inserted += 1,
                Some(previous) if previous == *record => outcome.unchanged += 1,
                Some(_) => outcome.updated += 1,
            }
        }

        Ok(outcome)
    }

    async fn insert_raw(&self, records: &[RawRecord]) -> Result<usize> {
        self.lock().raw.extend_from_slice(records);
        Ok(records.len())
    }

    async fn insert_quarantined(&self, records: &[QuarantinedRecord]) -> Result<usize> {
        self.lock().quarantined.extend_from_slice(records);
        Ok(records.len())
    }

    async fn create_run(&self, run: &Run) -> Result<()> {
        let mut inner = self.lock();
        if inner.runs.iter().any(|r| r.run_id == run.run_id) {
            return Err(StoreError::DuplicateKey {
                collection: "runs".to_string(),
                key: run.run_id.to_string(),
            }
            .into());
        }
        inner.runs.push(run.clone());
        Ok(())
    }

    async fn save_run(&self, run: &Run) -> Result<()> {
        let mut inner = self.lock();
        match inner.runs.iter_mut().find(|r| r.run_id == run.run_id) {
            Some(stored) => *stored = run.clone(),
            None => inner.runs.push(run.clone()),
        }
        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>> {
        Ok(self.lock().runs.iter().find(|r| &r.run_id == run_id).cloned())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
        let inner = self.lock();
        let mut runs: Vec<Run> = inner.runs.iter().rev().cloned().collect();
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn latest_unfinished_run(&self, excluding: &RunId) -> Result<Option<Run>> {
        let inner = self.lock();
        Ok(inner
            .runs
            .iter()
            .filter(|r| &r.run_id != excluding && r.status != RunStatus::Completed)
            .max_by_key(|r| r.start_time)
            .cloned())
    }

    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut inner = self.lock();
        let exists = inner.checkpoints.iter().any(|c| {
            c.run_id == checkpoint.run_id
                && c.source == checkpoint.source
                && c.batch_no == checkpoint.batch_no
        });
        if exists {
            return Err(StoreError::DuplicateKey {
                collection: "checkpoints".to_string(),
                key: checkpoint.key(),
            }
            .into());
        }
        inner.checkpoints.push(checkpoint.clone());
        Ok(())
    }

    async fn latest_completed_checkpoint(
        &self,
        run_id: &RunId,
        source: SourceKind,
    ) -> Result<Option<Checkpoint>> {
        let inner = self.lock();
        Ok(inner
            .checkpoints
            .iter()
            .filter(|c| {
                &c.run_id == run_id
                    && c.source == source
                    && c.status == CheckpointStatus::Completed
            })
            .max_by_key(|c| c.batch_no)
            .cloned())
    }

    async fn checkpoints_for_run(&self, run_id: &RunId) -> Result<Vec<Checkpoint>> {
        let inner = self.lock();
        let mut checkpoints: Vec<Checkpoint> = inner
            .checkpoints
            .iter()
            .filter(|c| &c.run_id == run_id)
            .cloned()
            .collect();
        checkpoints.sort_by_key(|c| (c.source, c.batch_no));
        Ok(checkpoints)
    }

    async fn create_schema_version(&self, version: &SchemaVersion) -> Result<()> {
        let mut inner = self.lock();
        let exists = inner
            .schema_versions
            .iter()
            .any(|v| v.source == version.source && v.version == version.version);
        if exists {
            return Err(StoreError::DuplicateKey {
                collection: "schema_versions".to_string(),
                key: version.key(),
            }
            .into());
        }
        inner.schema_versions.push(version.clone());
        Ok(())
    }

    async fn latest_schema_version(&self, source: SourceKind) -> Result<Option<SchemaVersion>> {
        let inner = self.lock();
        Ok(inner
            .schema_versions
            .iter()
            .filter(|v| v.source == source)
            .max_by_key(|v| v.version)
            .cloned())
    }

    async fn quarantined_for_run(&self, run_id: &RunId) -> Result<Vec<QuarantinedRecord>> {
        let inner = self.lock();
        Ok(inner
            .quarantined
            .iter()
            .filter(|q| &q.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn find_record(&self, key: &RecordKey) -> Result<Option<CanonicalRecord>> {
        Ok(self.lock().records.get(key).cloned())
    }

    async fn count_records(&self) -> Result<u64> {
        Ok(self.lock().records.len() as u64)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(symbol: &str, price: f64, secs: i64) -> CanonicalRecord {
        CanonicalRecord::new(
            symbol,
            Some(price),
            Some(1.0),
            SourceKind::Csv,
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryStore::new();
        let batch = vec![record("BTC", 100.0, 1_700_000_000), record("ETH", 5.0, 1_700_000_000)];

        let first = store.upsert_records(&batch).await.unwrap();
        assert_eq!(first.inserted, 2);

        let second = store.upsert_records(&batch).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(store.count_records().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_updates_changed_content() {
        let store = InMemoryStore::new();
        store
            .upsert_records(&[record("BTC", 100.0, 1_700_000_000)])
            .await
            .unwrap();
        let outcome = store
            .upsert_records(&[record("BTC", 101.0, 1_700_000_000)])
            .await
            .unwrap();
        assert_eq!(outcome.updated, 1);

        let key = record("BTC", 0.0, 1_700_000_000).key();
        let stored = store.find_record(&key).await.unwrap().unwrap();
        assert_eq!(stored.price_usd, Some(101.0));
    }

    #[tokio::test]
    async fn test_duplicate_checkpoint_rejected() {
        let store = InMemoryStore::new();
        let run_id = RunId::new("run_1").unwrap();
        let checkpoint = Checkpoint::completed(run_id.clone(), SourceKind::Csv, 1, 10);

        store.create_checkpoint(&checkpoint).await.unwrap();
        let err = store.create_checkpoint(&checkpoint).await.unwrap_err();
        assert!(matches!(
            err,
            crate::domain::MarketflowError::Store(StoreError::DuplicateKey { .. })
        ));

        store
            .create_checkpoint(&Checkpoint::completed(run_id.clone(), SourceKind::Csv, 2, 20))
            .await
            .unwrap();
        let latest = store
            .latest_completed_checkpoint(&run_id, SourceKind::Csv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.batch_no, 2);
        assert_eq!(latest.offset, 20);
    }

    #[tokio::test]
    async fn test_latest_unfinished_run_skips_completed_and_current() {
        let store = InMemoryStore::new();

        let mut failed = Run::start_with_id(RunId::new("run_failed").unwrap());
        failed.finish(RunStatus::Failed);
        store.create_run(&failed).await.unwrap();

        let mut completed = Run::start_with_id(RunId::new("run_ok").unwrap());
        completed.finish(RunStatus::Completed);
        store.create_run(&completed).await.unwrap();

        let current = Run::start_with_id(RunId::new("run_now").unwrap());
        store.create_run(&current).await.unwrap();

        let found = store
            .latest_unfinished_run(&current.run_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.run_id.as_str(), "run_failed");
    }

    #[tokio::test]
    async fn test_duplicate_schema_version_rejected() {
        let store = InMemoryStore::new();
        let version = SchemaVersion {
            source: SourceKind::Csv,
            version: 1_700_000_000_000,
            headers: vec!["ticker".to_string()],
            mappings: BTreeMap::new(),
            confidence: 0.9,
            created_at: Utc::now(),
        };
        store.create_schema_version(&version).await.unwrap();
        assert!(store.create_schema_version(&version).await.is_err());
        assert_eq!(store.schema_versions(SourceKind::Csv).len(), 1);
    }

    #[tokio::test]
    async fn test_list_runs_most_recent_first() {
        let store = InMemoryStore::new();
        for id in ["run_a", "run_b", "run_c"] {
            store
                .create_run(&Run::start_with_id(RunId::new(id).unwrap()))
                .await
                .unwrap();
        }
        let runs = store.list_runs(2).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id.as_str(), "run_c");
    }
}
