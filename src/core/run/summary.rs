//! Run summary and reporting
//!
//! Renders a finished [`Run`] and its checkpoints for the terminal and the log.

use crate::domain::{Checkpoint, Run, RunStatus};
use std::fmt::Write as _;

/// A run together with the checkpoints it wrote
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: Run,
    pub checkpoints: Vec<Checkpoint>,
}

impl RunSummary {
    pub fn new(run: Run, checkpoints: Vec<Checkpoint>) -> Self {
        Self { run, checkpoints }
    }

    /// Whether the run finished without errors or warnings
    pub fn is_successful(&self) -> bool {
        self.run.status == RunStatus::Completed
    }

    /// Process exit code for the run outcome
    pub fn exit_code(&self) -> i32 {
        match self.run.status {
            RunStatus::Completed | RunStatus::CompletedWithWarnings => 0,
            RunStatus::Started | RunStatus::Failed => 1,
        }
    }

    /// Log the summary
    pub fn log_summary(&self) {
        let stats = &self.run.stats;
        tracing::info!(
            run_id = %self.run.run_id,
            status = %self.run.status,
            extracted = stats.extracted,
            loaded = stats.loaded,
            duplicates = stats.duplicates,
            quarantined = stats.quarantined,
            throttle_events = stats.throttle_events,
            checkpoints = self.checkpoints.len(),
            "Run summary"
        );

        for error in &self.run.errors {
            tracing::warn!(
                run_id = %self.run.run_id,
                message = %error.message,
                detail = %error.detail,
                "Run error"
            );
        }
    }

    /// Multi-line report for the terminal
    pub fn render(&self) -> String {
        let run = &self.run;
        let stats = &run.stats;
        let mut out = String::new();

        let _ = writeln!(out, "Run {}", run.run_id);
        let _ = writeln!(out, "  Status:          {}", run.status);
        let _ = writeln!(out, "  Started:         {}", run.start_time.to_rfc3339());
        match (run.end_time, run.duration_ms()) {
            (Some(end), Some(ms)) => {
                let _ = writeln!(out, "  Finished:        {} ({ms} ms)", end.to_rfc3339());
            }
            _ => {
                let _ = writeln!(out, "  Finished:        -");
            }
        }
        if let Some(resume) = &run.resume_from {
            let _ = writeln!(
                out,
                "  Resumed from:    {} batch {} offset {}",
                resume.source, resume.batch_no, resume.offset
            );
        }
        let _ = writeln!(out, "  Extracted:       {}", stats.extracted);
        let _ = writeln!(out, "  Loaded:          {}", stats.loaded);
        let _ = writeln!(out, "  Duplicates:      {}", stats.duplicates);
        let _ = writeln!(out, "  Quarantined:     {}", stats.quarantined);
        let _ = writeln!(out, "  Throttle events: {}", stats.throttle_events);
        let _ = writeln!(out, "  Errors:          {}", stats.errors);

        for error in &run.errors {
            let _ = writeln!(out, "    - {}: {}", error.message, error.detail);
        }

        if !self.checkpoints.is_empty() {
            let _ = writeln!(out, "  Checkpoints:");
            for checkpoint in &self.checkpoints {
                let _ = writeln!(
                    out,
                    "    {} batch {} offset {} ({})",
                    checkpoint.source,
                    checkpoint.batch_no,
                    checkpoint.offset,
                    checkpoint.status.as_str()
                );
            }
        }

        out
    }
}
