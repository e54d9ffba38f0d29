//! Idempotent loading
//!
//! Canonical records are upserted on `(symbol, timestamp)` in batches of
//! `load.batch_size`; raw payloads are appended for audit. One completed
//! checkpoint is written per batch for the resumable source.

use crate::adapters::database::{MarketStore, UpsertOutcome};
use crate::config::LoadConfig;
use crate::domain::{
    CanonicalRecord, Checkpoint, MarketflowError, RawRecord, RecordKey, Result, RunId, SourceKind,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Offsets of the resumable source covered by this load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPlan {
    pub source: SourceKind,
    /// Offset the run resumed from
    pub start_offset: u64,
    /// Offset after the last row extracted
    pub end_offset: u64,
}

/// Progress of a load; stays meaningful when the load fails midway
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Batches fully persisted
    pub batches: u32,
    pub outcome: UpsertOutcome,
    /// Records folded into a later record with the same key
    pub collapsed: usize,
    pub raw_appended: usize,
    pub checkpoints: Vec<Checkpoint>,
}

impl LoadReport {
    /// Records whose stored state changed
    pub fn loaded(&self) -> usize {
        self.outcome.written()
    }

    /// Records that did not change the store
    pub fn duplicates(&self) -> usize {
        self.collapsed + self.outcome.unchanged
    }
}

/// Collapses records sharing a key, keeping the last one in first position
///
/// Returns the surviving records and how many were folded away. The result
/// is the same as upserting the records one by one. It is needed because
/// PostgreSQL's `ON CONFLICT DO UPDATE` cannot touch the same row twice in one
/// statement. Records already in the store are still settled by the upsert.
pub fn collapse_duplicates(records: Vec<CanonicalRecord>) -> (Vec<CanonicalRecord>, usize) {
    let mut positions: HashMap<RecordKey, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
    let mut collapsed = 0;

    for record in records {
        match positions.get(&record.key()) {
            Some(&index) => {
                unique[index] = record;
                collapsed += 1;
            }
            None => {
                positions.insert(record.key(), unique.len());
                unique.push(record);
            }
        }
    }

    (unique, collapsed)
}

/// Writes a run's load set to the store
pub struct Loader {
    store: Arc<dyn MarketStore + Send + Sync>,
    batch_size: usize,
    store_raw: bool,
}

impl Loader {
    pub fn new(store: Arc<dyn MarketStore + Send + Sync>, config: &LoadConfig) -> Self {
        Self {
            store,
            batch_size: config.batch_size.max(1),
            store_raw: config.store_raw,
        }
    }

    /// Loads records, recording progress in `report` as batches complete
    ///
    /// An empty record set is still one (empty) batch, so the resumable
    /// source's checkpoint advances.
    ///
    /// # Errors
    ///
    /// Returns the first store error; `report` then describes the batches
    /// persisted before it.
    pub async fn load(
        &self,
        run_id: &RunId,
        records: Vec<CanonicalRecord>,
        raw: &[RawRecord],
        checkpoint: Option<CheckpointPlan>,
        report: &mut LoadReport,
    ) -> Result<()> {
        let (records, collapsed) = collapse_duplicates(records);
        report.collapsed += collapsed;

        if self.store_raw && !raw.is_empty() {
            report.raw_appended += self.store.insert_raw(raw).await?;
        }

        let batches: Vec<&[CanonicalRecord]> = if records.is_empty() {
            vec![records.as_slice()]
        } else {
            records.chunks(self.batch_size).collect()
        };
        let total = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            let batch_no = (index + 1) as u32;
            let outcome = self.store.upsert_records(batch).await?;
            report.outcome.merge(outcome);

            if let Some(plan) = checkpoint {
                let offset = if index + 1 == total {
                    plan.end_offset
                } else {
                    plan.start_offset
                };
                let marker = Checkpoint::completed(run_id.clone(), plan.source, batch_no, offset);
                self.write_checkpoint(&marker).await?;
                report.checkpoints.push(marker);
            }

            report.batches += 1;
            tracing::info!(
                run_id = %run_id,
                batch_no,
                records = batch.len(),
                inserted = outcome.inserted,
                updated = outcome.updated,
                unchanged = outcome.unchanged,
                "Batch loaded"
            );
        }

        Ok(())
    }

    async fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        match self.store.create_checkpoint(checkpoint).await {
            Ok(()) => {
                tracing::debug!(
                    checkpoint = %checkpoint.key(),
                    offset = checkpoint.offset,
                    "Checkpoint written"
                );
                Ok(())
            }
            Err(MarketflowError::Store(e)) if e.is_duplicate() => {
                tracing::warn!(checkpoint = %checkpoint.key(), "Checkpoint already recorded");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
