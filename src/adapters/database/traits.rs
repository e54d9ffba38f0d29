//! Store abstraction traits
//!
//! This module defines the primitives the ETL core needs from a durable
//! store. Backends implement [`MarketStore`] and are shared behind
//! `Arc<dyn MarketStore + Send + Sync>`.

use crate::domain::{
    CanonicalRecord, Checkpoint, QuarantinedRecord, RawRecord, RecordKey, Result, Run, RunId,
    SchemaVersion, SourceKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a keyed upsert of canonical records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// Keys that did not exist before
    pub inserted: usize,

    /// Existing keys whose content changed
    pub updated: usize,

    /// Existing keys written with identical content
    pub unchanged: usize,
}

impl UpsertOutcome {
    /// Records whose stored state changed
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    /// Adds another outcome into this one
    pub fn merge(&mut self, other: UpsertOutcome) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

/// Store trait for canonical, raw and bookkeeping data
///
/// Canonical records are keyed by `(symbol, timestamp)`; raw and quarantined
/// records are append-only. Checkpoints and schema versions are immutable and
/// creating one with an existing key fails with a duplicate-key error.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Test the store connection
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn test_connection(&self) -> Result<()>;

    /// Ensure tables and indexes exist
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    async fn ensure_schema(&self) -> Result<()>;

    /// Upsert canonical records keyed by `(symbol, timestamp)`
    ///
    /// Applying the same records twice leaves the store as applying them once.
    async fn upsert_records(&self, records: &[CanonicalRecord]) -> Result<UpsertOutcome>;

    /// Append raw audit records
    ///
    /// # Returns
    ///
    /// Number of rows appended.
    async fn insert_raw(&self, records: &[RawRecord]) -> Result<usize>;

    /// Append quarantined records
    async fn insert_quarantined(&self, records: &[QuarantinedRecord]) -> Result<usize>;

    /// Persist a newly started run
    async fn create_run(&self, run: &Run) -> Result<()>;

    /// Overwrite the stored state of a run
    async fn save_run(&self, run: &Run) -> Result<()>;

    /// Fetch one run
    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>>;

    /// Most recent runs first
    async fn list_runs(&self, limit: usize) -> Result<Vec<Run>>;

    /// Most recent run, other than `excluding`, whose status is not `completed`
    async fn latest_unfinished_run(&self, excluding: &RunId) -> Result<Option<Run>>;

    /// Create a checkpoint
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` when `(run_id, source, batch_no)`
    /// already exists.
    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Highest-numbered completed checkpoint of a run for one source
    async fn latest_completed_checkpoint(
        &self,
        run_id: &RunId,
        source: SourceKind,
    ) -> Result<Option<Checkpoint>>;

    /// All checkpoints of a run ordered by source and batch number
    async fn checkpoints_for_run(&self, run_id: &RunId) -> Result<Vec<Checkpoint>>;

    /// Create a schema version
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` when `(source, version)` already
    /// exists.
    async fn create_schema_version(&self, version: &SchemaVersion) -> Result<()>;

    /// Highest schema version recorded for a source
    async fn latest_schema_version(&self, source: SourceKind) -> Result<Option<SchemaVersion>>;

    /// Quarantined records written by a run
    async fn quarantined_for_run(&self, run_id: &RunId) -> Result<Vec<QuarantinedRecord>>;

    /// Look up one canonical record
    async fn find_record(&self, key: &RecordKey) -> Result<Option<CanonicalRecord>>;

    /// Number of canonical records
    async fn count_records(&self) -> Result<u64>;

    /// Name of the backend, for logs
    fn backend_name(&self) -> &str;
}
