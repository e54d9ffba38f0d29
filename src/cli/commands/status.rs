//! Status command implementation
//!
//! This module implements the `status` command for displaying recent runs
//! and the checkpoints they wrote.

use crate::adapters::database::{create_store, MarketStore};
use crate::config::load_config;
use crate::domain::{Run, RunStatus};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of runs to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// Also list each run's checkpoints
    #[arg(long)]
    pub checkpoints: bool,
}

fn status_label(run: &Run) -> &'static str {
    match run.status {
        RunStatus::Completed => "completed",
        RunStatus::CompletedWithWarnings => "warnings",
        RunStatus::Failed => "failed",
        RunStatus::Started => "in progress",
    }
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking run status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let store = match create_store(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("Failed to connect to store");
                println!("   Error: {e}");
                return Ok(4);
            }
        };

        self.report(store.as_ref()).await
    }

    async fn report(&self, store: &(dyn MarketStore + Send + Sync)) -> anyhow::Result<i32> {
        let runs = match store.list_runs(self.limit).await {
            Ok(runs) => runs,
            Err(e) => {
                println!("Failed to load runs");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        if runs.is_empty() {
            println!("No run history found in the {} store.", store.backend_name());
            println!("Run 'marketflow run' to start ingesting data.");
            return Ok(0);
        }

        let records = store.count_records().await.unwrap_or_default();
        println!("Store: {} ({records} canonical records)", store.backend_name());
        println!();
        println!(
            "{:<42} {:<12} {:<20} {:>9} {:>7} {:>6} {:>6}",
            "Run ID", "Status", "Started", "Extracted", "Loaded", "Quar.", "Errors"
        );
        println!("{}", "-".repeat(108));

        for run in &runs {
            println!(
                "{:<42} {:<12} {:<20} {:>9} {:>7} {:>6} {:>6}",
                run.run_id.as_str(),
                status_label(run),
                run.start_time.format("%Y-%m-%d %H:%M:%S"),
                run.stats.extracted,
                run.stats.loaded,
                run.stats.quarantined,
                run.stats.errors
            );

            if self.checkpoints {
                let checkpoints = store.checkpoints_for_run(&run.run_id).await?;
                for checkpoint in checkpoints {
                    println!(
                        "    {} batch {} offset {} ({})",
                        checkpoint.source,
                        checkpoint.batch_no,
                        checkpoint.offset,
                        checkpoint.status.as_str()
                    );
                }
            }
        }

        println!();
        Ok(0)
    }
}
