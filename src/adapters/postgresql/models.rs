//! Row mapping for the PostgreSQL store
//!
//! Enum-valued columns are stored as their snake_case names; nested run data
//! (stats, resume pointer, error log) is stored as JSONB.

use crate::domain::{
    CanonicalRecord, Checkpoint, CheckpointStatus, QuarantineReason, QuarantinedRecord, Result,
    ResumePointer, Run, RunErrorEntry, RunId, RunStats, RunStatus, SchemaVersion, SourceKind,
    StoreError,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_postgres::Row;

fn decode_err(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Decode(format!("{what}: {detail}"))
}

fn source_kind(value: &str) -> Result<SourceKind> {
    value
        .parse::<SourceKind>()
        .map_err(|e| decode_err("source", e).into())
}

fn run_id(value: String) -> Result<RunId> {
    RunId::new(value).map_err(|e| decode_err("run_id", e).into())
}

fn from_json<T: serde::de::DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| decode_err(what, e).into())
}

/// Decodes a `market_records` row
pub fn record_from_row(row: &Row) -> Result<CanonicalRecord> {
    let source: String = row.get("source");
    Ok(CanonicalRecord {
        symbol: row.get("symbol"),
        price_usd: row.get("price_usd"),
        volume: row.get("volume"),
        source: source_kind(&source)?,
        timestamp: row.get("ts"),
        metadata: row.get("metadata"),
    })
}

/// Decodes a `runs` row
pub fn run_from_row(row: &Row) -> Result<Run> {
    let status: String = row.get("status");
    let stats: Value = row.get("stats");
    let resume_from: Option<Value> = row.get("resume_from");
    let errors: Value = row.get("errors");

    Ok(Run {
        run_id: run_id(row.get("run_id"))?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        status: RunStatus::parse(&status).ok_or_else(|| decode_err("status", &status))?,
        stats: from_json::<RunStats>("stats", stats)?,
        resume_from: resume_from
            .map(|v| from_json::<ResumePointer>("resume_from", v))
            .transpose()?,
        errors: from_json::<Vec<RunErrorEntry>>("errors", errors)?,
    })
}

/// JSONB columns of a run: stats, resume pointer, error log
pub fn run_json_columns(run: &Run) -> Result<(Value, Option<Value>, Value)> {
    let stats = serde_json::to_value(&run.stats)?;
    let resume_from = run
        .resume_from
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    let errors = serde_json::to_value(&run.errors)?;
    Ok((stats, resume_from, errors))
}

/// Decodes a `checkpoints` row
pub fn checkpoint_from_row(row: &Row) -> Result<Checkpoint> {
    let source: String = row.get("source");
    let status: String = row.get("status");
    let batch_no: i32 = row.get("batch_no");
    let offset: i64 = row.get("offset");

    Ok(Checkpoint {
        run_id: run_id(row.get("run_id"))?,
        source: source_kind(&source)?,
        batch_no: u32::try_from(batch_no).map_err(|e| decode_err("batch_no", e))?,
        offset: u64::try_from(offset).map_err(|e| decode_err("offset", e))?,
        status: CheckpointStatus::parse(&status).ok_or_else(|| decode_err("status", &status))?,
        created_at: row.get("created_at"),
    })
}

/// Decodes a `schema_versions` row
pub fn schema_version_from_row(row: &Row) -> Result<SchemaVersion> {
    let source: String = row.get("source");
    let headers: Value = row.get("headers");
    let mappings: Value = row.get("mappings");

    Ok(SchemaVersion {
        source: source_kind(&source)?,
        version: row.get("version"),
        headers: from_json::<Vec<String>>("headers", headers)?,
        mappings: from_json::<BTreeMap<String, String>>("mappings", mappings)?,
        confidence: row.get("confidence"),
        created_at: row.get("created_at"),
    })
}

/// Decodes a `quarantined_records` row
pub fn quarantined_from_row(row: &Row) -> Result<QuarantinedRecord> {
    let source: String = row.get("source");
    let reason: String = row.get("reason");

    Ok(QuarantinedRecord {
        run_id: run_id(row.get("run_id"))?,
        source: source_kind(&source)?,
        reason: QuarantineReason::parse(&reason).ok_or_else(|| decode_err("reason", &reason))?,
        payload: row.get("payload"),
        confidence_score: row.get("confidence_score"),
        detail: row.get("detail"),
        created_at: row.get("created_at"),
    })
}
