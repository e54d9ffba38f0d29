//! Core business logic for Marketflow.
//!
//! # Modules
//!
//! - [`ratelimit`] - Per-source token buckets
//! - [`schema`] - Header drift detection and reconciliation for the file source
//! - [`transform`] - Normalization and validation into canonical records
//! - [`load`] - Idempotent loading with per-batch checkpoints
//! - [`run`] - Run orchestration, resume cursor and summaries
//! - [`metrics`] - Counters and latency histogram
//!
//! # Run Workflow
//!
//! 1. **Start**: Persist a `started` run
//! 2. **Resume**: Find the last unfinished run's checkpoint for the file source
//! 3. **Extract**: Fetch every source concurrently, each behind its token bucket
//! 4. **Reconcile**: Map drifted file headers or quarantine the batch
//! 5. **Transform**: Normalize and validate; invalid records are quarantined
//! 6. **Load**: Upsert canonical records, append raw payloads, checkpoint
//! 7. **Finish**: Record the terminal status and stats
//!
//! # Example
//!
//! ```rust,no_run
//! use marketflow::config::load_config;
//! use marketflow::core::run::RunOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("marketflow.toml")?;
//! let orchestrator = RunOrchestrator::from_config(&config).await?;
//!
//! let run = orchestrator.execute_run().await?;
//!
//! println!("Status: {}", run.status);
//! println!("Loaded: {}", run.stats.loaded);
//! # Ok(())
//! # }
//! ```

pub mod load;
pub mod metrics;
pub mod ratelimit;
pub mod run;
pub mod schema;
pub mod transform;
