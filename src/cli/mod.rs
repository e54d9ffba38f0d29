//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Marketflow using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Marketflow - market data ETL
#[derive(Parser, Debug)]
#[command(name = "marketflow")]
#[command(version, about, long_about = None)]
#[command(author = "Marketflow Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "marketflow.toml", env = "MARKETFLOW_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MARKETFLOW_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one ETL run and print its summary
    Run(commands::run::RunArgs),

    /// Start the HTTP trigger endpoint
    Serve(commands::serve::ServeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show recent runs and their checkpoints
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["marketflow", "run"]);
        assert_eq!(cli.config, "marketflow.toml");
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["marketflow", "--config", "custom.toml", "run"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["marketflow", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_serve_with_port() {
        let cli = Cli::parse_from(["marketflow", "serve", "--port", "8080"]);
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.port, Some(8080)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["marketflow", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["marketflow", "status", "--limit", "5"]);
        match cli.command {
            Commands::Status(args) => assert_eq!(args.limit, 5),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["marketflow", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
