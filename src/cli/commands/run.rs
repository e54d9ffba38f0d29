//! Run command implementation
//!
//! This module implements the `run` command, which executes one ETL run in
//! the foreground and prints its summary.

use crate::config::load_config;
use crate::core::run::{RunOrchestrator, RunSummary};
use crate::domain::SourceKind;
use clap::Args;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Override the sources to extract (comma-separated: assets_api,csv,tickers_api)
    #[arg(long)]
    pub sources: Option<String>,

    /// Load the remaining sources when one source fails
    #[arg(long)]
    pub continue_on_source_failure: bool,

    /// Override the CSV file path
    #[arg(long)]
    pub csv_path: Option<String>,
}

impl RunArgs {
    /// Parses the `--sources` override
    fn source_override(&self) -> Result<Option<Vec<SourceKind>>, String> {
        let Some(sources) = &self.sources else {
            return Ok(None);
        };
        sources
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<SourceKind>)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Execute the run command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        // Apply CLI overrides
        match self.source_override() {
            Ok(Some(sources)) => {
                tracing::info!(sources = ?sources, "Overriding sources from CLI");
                config.run.sources = sources;
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("Invalid --sources: {e}");
                return Ok(2);
            }
        }

        if self.continue_on_source_failure {
            tracing::info!("Continuing past source failures (CLI)");
            config.run.continue_on_source_failure = true;
        }

        if let Some(path) = &self.csv_path {
            tracing::info!(path = %path, "Overriding CSV path from CLI");
            config.sources.csv.path = path.clone();
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let orchestrator = match RunOrchestrator::from_config(&config).await {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create run orchestrator");
                eprintln!("Failed to initialize run: {e}");
                return Ok(4);
            }
        };

        println!("Starting run against {:?}...", orchestrator.sources());
        println!();

        let run = match orchestrator.execute_run().await {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(error = %e, "Run failed to start");
                eprintln!("Run failed: {e}");
                return Ok(5);
            }
        };

        let checkpoints = match orchestrator.store().checkpoints_for_run(&run.run_id).await {
            Ok(checkpoints) => checkpoints,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read checkpoints for summary");
                Vec::new()
            }
        };

        let summary = RunSummary::new(run, checkpoints);
        summary.log_summary();
        print!("{}", summary.render());
        println!();

        Ok(summary.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_source_override_parsing() {
        let args = RunArgs {
            sources: Some("csv, tickers_api".to_string()),
            ..Default::default()
        };
        assert_eq!(
            args.source_override().unwrap(),
            Some(vec![SourceKind::Csv, SourceKind::TickersApi])
        );

        let bad = RunArgs {
            sources: Some("csv,ftp".to_string()),
            ..Default::default()
        };
        assert!(bad.source_override().is_err());
        assert_eq!(RunArgs::default().source_override().unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let code = RunArgs::default()
            .execute("/nonexistent/marketflow.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_run_from_csv_only_config() {
        let mut csv = NamedTempFile::new().unwrap();
        writeln!(csv, "ticker,price_usd,tx_volume,time").unwrap();
        writeln!(csv, "BTC,68000.5,12,1728561600").unwrap();

        let mut config = NamedTempFile::new().unwrap();
        write!(
            config,
            r#"
[sources.assets]
enabled = false

[sources.tickers]
enabled = false

[sources.csv]
path = "{}"
"#,
            csv.path().display()
        )
        .unwrap();

        let code = RunArgs::default()
            .execute(config.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
