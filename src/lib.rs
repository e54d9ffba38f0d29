// Marketflow - Market data ETL orchestrator
// Copyright (c) 2025 Marketflow Contributors
// Licensed under the MIT License

//! # Marketflow - Market data ETL
//!
//! Marketflow pulls market data from an asset list API, a tickers API and a
//! header-delimited file, reconciles and normalizes it into one canonical
//! record shape, and loads it idempotently into a durable store.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Extracting** from rate-limited, retried sources with a last-known-good cache
//! - **Reconciling** drifting file headers against the canonical schema
//! - **Normalizing** records through per-field fallback chains and validating them
//! - **Loading** records with natural-key upserts and per-source checkpoints
//! - **Orchestrating** single-flight runs with a persisted run history
//!
//! ## Architecture
//!
//! Marketflow follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (rate limiting, schema, transform, load, runs)
//! - [`adapters`] - External integrations (HTTP sources, CSV, PostgreSQL)
//! - [`server`] - HTTP trigger endpoint
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marketflow::config::load_config;
//! use marketflow::core::run::RunOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("marketflow.toml")?;
//!     let orchestrator = RunOrchestrator::from_config(&config).await?;
//!
//!     let run = orchestrator.execute_run().await?;
//!
//!     println!("Run {} loaded {} records", run.run_id, run.stats.loaded);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::MarketflowError`]; source and store failures
//! carry their own [`domain::SourceError`] and [`domain::StoreError`] kinds.
//! CLI commands map failures onto process exit codes.
//!
//! ## Logging
//!
//! Marketflow uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(source = "csv", rows = 12, "Extracted");
//! warn!(source = "tickers_api", "Serving last-known-good batch");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
pub mod server;
