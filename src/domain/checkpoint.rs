//! Checkpoints and schema versions
//!
//! Both are immutable once written; stores reject duplicate keys.

use super::ids::{RunId, SourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Checkpoint status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    Completed,
    Failed,
}

impl CheckpointStatus {
    /// Stored name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Pending => "pending",
            CheckpointStatus::Completed => "completed",
            CheckpointStatus::Failed => "failed",
        }
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(CheckpointStatus::Pending),
            "completed" => Some(CheckpointStatus::Completed),
            "failed" => Some(CheckpointStatus::Failed),
            _ => None,
        }
    }
}

/// Marker of how far a source has been durably consumed by a run
///
/// Unique on `(run_id, source, batch_no)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: RunId,
    pub source: SourceKind,
    pub batch_no: u32,
    /// Rows consumed so far for the source
    pub offset: u64,
    pub status: CheckpointStatus,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Creates a completed checkpoint
    pub fn completed(run_id: RunId, source: SourceKind, batch_no: u32, offset: u64) -> Self {
        Self {
            run_id,
            source,
            batch_no,
            offset,
            status: CheckpointStatus::Completed,
            created_at: Utc::now(),
        }
    }

    /// Display form of the unique key
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.run_id, self.source, self.batch_no)
    }
}

/// Audit entry for a reconciled header drift
///
/// Unique on `(source, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub source: SourceKind,
    /// Creation time in Unix milliseconds, strictly increasing per source
    pub version: i64,
    /// Headers as observed in the batch
    pub headers: Vec<String>,
    /// Observed header name to canonical header name
    pub mappings: BTreeMap<String, String>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl SchemaVersion {
    /// Display form of the unique key
    pub fn key(&self) -> String {
        format!("{}/{}", self.source, self.version)
    }
}
