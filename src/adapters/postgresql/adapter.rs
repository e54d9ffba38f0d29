//! PostgreSQL adapter implementing the store trait

use super::client::{classify_error, PostgreSQLClient};
use super::models::{
    checkpoint_from_row, quarantined_from_row, record_from_row, run_from_row, run_json_columns,
    schema_version_from_row,
};
use crate::adapters::database::traits::{MarketStore, UpsertOutcome};
use crate::domain::{
    CanonicalRecord, Checkpoint, QuarantinedRecord, RawRecord, RecordKey, Result, Run, RunId,
    SchemaVersion, SourceKind, StoreError,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

const UPSERT_RECORD: &str = r#"
    INSERT INTO market_records (symbol, ts, price_usd, volume, source, metadata, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, NOW())
    ON CONFLICT (symbol, ts) DO UPDATE SET
        price_usd = EXCLUDED.price_usd,
        volume = EXCLUDED.volume,
        source = EXCLUDED.source,
        metadata = EXCLUDED.metadata,
        updated_at = NOW()
    WHERE (market_records.price_usd, market_records.volume, market_records.source, market_records.metadata)
        IS DISTINCT FROM (EXCLUDED.price_usd, EXCLUDED.volume, EXCLUDED.source, EXCLUDED.metadata)
    RETURNING (xmax = 0) AS inserted
"#;

/// PostgreSQL implementation of [`MarketStore`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl MarketStore for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn upsert_records(&self, records: &[CanonicalRecord]) -> Result<UpsertOutcome> {
        if records.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| classify_error(e, "Failed to open transaction"))?;
        let statement = tx
            .prepare_cached(UPSERT_RECORD)
            .await
            .map_err(|e| classify_error(e, "Failed to prepare upsert"))?;

        let mut outcome = UpsertOutcome::default();
        for record in records {
            let source = record.source.as_str();
            let row = tx
                .query_opt(
                    &statement,
                    &[
                        &record.symbol,
                        &record.timestamp,
                        &record.price_usd,
                        &record.volume,
                        &source,
                        &record.metadata,
                    ],
                )
                .await
                .map_err(|e| {
                    StoreError::WriteRejected(format!("Upsert of {} failed: {e}", record.key()))
                })?;

            match row {
                Some(row) if row.get::<_, bool>("inserted") => outcome.inserted += 1,
                Some(_) => outcome.updated += 1,
                None => outcome.unchanged += 1,
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::WriteRejected(format!("Commit failed: {e}")))?;

        tracing::debug!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            "Upserted canonical records into PostgreSQL"
        );

        Ok(outcome)
    }

    async fn insert_raw(&self, records: &[RawRecord]) -> Result<usize> {
        let query = "INSERT INTO raw_records (run_id, source, data, ingested_at) \
                     VALUES ($1, $2, $3, $4)";

        for record in records {
            self.client
                .execute(
                    query,
                    &[
                        &record.run_id.as_str(),
                        &record.source.as_str(),
                        &record.data,
                        &record.ingested_at,
                    ],
                )
                .await?;
        }

        Ok(records.len())
    }

    async fn insert_quarantined(&self, records: &[QuarantinedRecord]) -> Result<usize> {
        let query = r#"
            INSERT INTO quarantined_records (
                run_id, source, reason, payload, confidence_score, detail, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;

        for record in records {
            self.client
                .execute(
                    query,
                    &[
                        &record.run_id.as_str(),
                        &record.source.as_str(),
                        &record.reason.as_str(),
                        &record.payload,
                        &record.confidence_score,
                        &record.detail,
                        &record.created_at,
                    ],
                )
                .await?;
        }

        Ok(records.len())
    }

    async fn create_run(&self, run: &Run) -> Result<()> {
        let (stats, resume_from, errors) = run_json_columns(run)?;
        let query = r#"
            INSERT INTO runs (run_id, start_time, end_time, status, stats, resume_from, errors)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;

        self.client
            .execute(
                query,
                &[
                    &run.run_id.as_str(),
                    &run.start_time,
                    &run.end_time,
                    &run.status.as_str(),
                    &stats,
                    &resume_from,
                    &errors,
                ],
            )
            .await?;

        Ok(())
    }

    async fn save_run(&self, run: &Run) -> Result<()> {
        let (stats, resume_from, errors) = run_json_columns(run)?;
        let query = r#"
            INSERT INTO runs (run_id, start_time, end_time, status, stats, resume_from, errors)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (run_id) DO UPDATE SET
                end_time = EXCLUDED.end_time,
                status = EXCLUDED.status,
                stats = EXCLUDED.stats,
                resume_from = EXCLUDED.resume_from,
                errors = EXCLUDED.errors
        "#;

        self.client
            .execute(
                query,
                &[
                    &run.run_id.as_str(),
                    &run.start_time,
                    &run.end_time,
                    &run.status.as_str(),
                    &stats,
                    &resume_from,
                    &errors,
                ],
            )
            .await?;

        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>> {
        let rows = self
            .client
            .query("SELECT * FROM runs WHERE run_id = $1", &[&run_id.as_str()])
            .await?;
        rows.first().map(run_from_row).transpose()
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .client
            .query(
                "SELECT * FROM runs ORDER BY start_time DESC LIMIT $1",
                &[&limit],
            )
            .await?;
        rows.iter().map(run_from_row).collect()
    }

    async fn latest_unfinished_run(&self, excluding: &RunId) -> Result<Option<Run>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM runs WHERE run_id <> $1 AND status <> 'completed' \
                 ORDER BY start_time DESC LIMIT 1",
                &[&excluding.as_str()],
            )
            .await?;
        rows.first().map(run_from_row).transpose()
    }

    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let batch_no = i32::try_from(checkpoint.batch_no)
            .map_err(|e| StoreError::WriteRejected(format!("batch_no out of range: {e}")))?;
        let offset = i64::try_from(checkpoint.offset)
            .map_err(|e| StoreError::WriteRejected(format!("offset out of range: {e}")))?;

        let query = r#"
            INSERT INTO checkpoints (run_id, source, batch_no, "offset", status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#;

        self.client
            .execute(
                query,
                &[
                    &checkpoint.run_id.as_str(),
                    &checkpoint.source.as_str(),
                    &batch_no,
                    &offset,
                    &checkpoint.status.as_str(),
                    &checkpoint.created_at,
                ],
            )
            .await?;

        tracing::debug!(checkpoint = %checkpoint.key(), offset = checkpoint.offset, "Checkpoint written");
        Ok(())
    }

    async fn latest_completed_checkpoint(
        &self,
        run_id: &RunId,
        source: SourceKind,
    ) -> Result<Option<Checkpoint>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM checkpoints WHERE run_id = $1 AND source = $2 \
                 AND status = 'completed' ORDER BY batch_no DESC LIMIT 1",
                &[&run_id.as_str(), &source.as_str()],
            )
            .await?;
        rows.first().map(checkpoint_from_row).transpose()
    }

    async fn checkpoints_for_run(&self, run_id: &RunId) -> Result<Vec<Checkpoint>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM checkpoints WHERE run_id = $1 ORDER BY source, batch_no",
                &[&run_id.as_str()],
            )
            .await?;
        rows.iter().map(checkpoint_from_row).collect()
    }

    async fn create_schema_version(&self, version: &SchemaVersion) -> Result<()> {
        let headers = serde_json::to_value(&version.headers)?;
        let mappings = serde_json::to_value(&version.mappings)?;
        let query = r#"
            INSERT INTO schema_versions (source, version, headers, mappings, confidence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#;

        self.client
            .execute(
                query,
                &[
                    &version.source.as_str(),
                    &version.version,
                    &headers,
                    &mappings,
                    &version.confidence,
                    &version.created_at,
                ],
            )
            .await?;

        Ok(())
    }

    async fn latest_schema_version(&self, source: SourceKind) -> Result<Option<SchemaVersion>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM schema_versions WHERE source = $1 ORDER BY version DESC LIMIT 1",
                &[&source.as_str()],
            )
            .await?;
        rows.first().map(schema_version_from_row).transpose()
    }

    async fn quarantined_for_run(&self, run_id: &RunId) -> Result<Vec<QuarantinedRecord>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM quarantined_records WHERE run_id = $1 ORDER BY id",
                &[&run_id.as_str()],
            )
            .await?;
        rows.iter().map(quarantined_from_row).collect()
    }

    async fn find_record(&self, key: &RecordKey) -> Result<Option<CanonicalRecord>> {
        let ts = Utc
            .timestamp_millis_opt(key.timestamp_ms)
            .single()
            .ok_or_else(|| StoreError::QueryFailed(format!("invalid timestamp in key {key}")))?;
        let rows = self
            .client
            .query(
                "SELECT * FROM market_records WHERE symbol = $1 AND ts = $2",
                &[&key.symbol, &ts],
            )
            .await?;
        rows.first().map(record_from_row).transpose()
    }

    async fn count_records(&self) -> Result<u64> {
        let rows = self
            .client
            .query("SELECT COUNT(*) FROM market_records", &[])
            .await?;
        let count: i64 = rows.first().map(|row| row.get(0)).unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn backend_name(&self) -> &str {
        "postgresql"
    }
}
