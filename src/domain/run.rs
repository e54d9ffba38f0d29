//! Run lifecycle model
//!
//! A [`Run`] is created in `started` state and moves exactly once to a
//! terminal state. Only the orchestrator mutates it.

use super::ids::{RunId, SourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Completed,
    Failed,
    CompletedWithWarnings,
}

impl RunStatus {
    /// Stored name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::CompletedWithWarnings => "completed_with_warnings",
        }
    }

    /// Whether the status is final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Started)
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "started" => Some(RunStatus::Started),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            "completed_with_warnings" => Some(RunStatus::CompletedWithWarnings),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative counters of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Items pulled from all sources
    pub extracted: usize,
    /// Canonical records inserted or changed
    pub loaded: usize,
    /// Records collapsed in the load set or left unchanged by the upsert
    pub duplicates: usize,
    /// Payloads written to (or destined for) quarantine
    pub quarantined: usize,
    /// Errors of any kind
    pub errors: usize,
    /// Failed limiter acquisitions during the run
    pub throttle_events: usize,
}

/// Where a run picked up the file source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePointer {
    pub source: SourceKind,
    pub batch_no: u32,
    pub offset: u64,
}

/// One error appended to a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunErrorEntry {
    /// Short message identifying the failing stage
    pub message: String,
    /// Underlying error text
    pub detail: String,
    /// When the error was recorded
    pub timestamp: DateTime<Utc>,
}

/// A single ETL execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stats: RunStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_from: Option<ResumePointer>,
    #[serde(default)]
    pub errors: Vec<RunErrorEntry>,
}

impl Run {
    /// Starts a new run with a fresh identifier
    pub fn start() -> Self {
        Self::start_with_id(RunId::generate())
    }

    /// Starts a new run with a given identifier
    pub fn start_with_id(run_id: RunId) -> Self {
        Self {
            run_id,
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Started,
            stats: RunStats::default(),
            resume_from: None,
            errors: Vec::new(),
        }
    }

    /// Appends an error entry and bumps the error counter
    pub fn add_error(&mut self, message: impl Into<String>, detail: impl Into<String>) {
        self.errors.push(RunErrorEntry {
            message: message.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        });
        self.stats.errors += 1;
    }

    /// Moves the run to a terminal status and stamps `end_time`
    ///
    /// Calling it on an already finished run leaves the run untouched.
    pub fn finish(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        let status = if status.is_terminal() {
            status
        } else {
            RunStatus::Failed
        };
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    /// Wall-clock duration, once finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0))
    }

    /// Whether the run left `started`
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
