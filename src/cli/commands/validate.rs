//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Marketflow configuration file.

use crate::config::load_config;
use crate::config::schema::StoreBackend;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        // Loading also validates
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Active Sources: {:?}", config.active_sources());
        if config.sources.assets.enabled {
            println!("  Assets API: {}", config.sources.assets.base_url);
        }
        if config.sources.tickers.enabled {
            println!(
                "  Tickers API: {}{}",
                config.sources.tickers.base_url, config.sources.tickers.path
            );
        }
        if config.sources.csv.enabled {
            println!("  CSV File: {}", config.sources.csv.path);
        }
        println!(
            "  Schema Thresholds: drop < {} <= map < {} <= exact",
            config.schema.drop_threshold, config.schema.exact_threshold
        );
        println!("  Load Batch Size: {}", config.load.batch_size);

        match config.store.backend {
            StoreBackend::Memory => println!("  Store: memory"),
            StoreBackend::PostgreSQL => {
                if let Some(ref pg_config) = config.store.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Store: postgresql");
                    println!(
                        "  PostgreSQL Connection: {}",
                        pg_config
                            .connection_string
                            .expose_secret()
                            .as_str()
                            .split('@')
                            .next_back()
                            .unwrap_or("***")
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                }
            }
        }

        println!(
            "  Trigger Endpoint: {}:{}",
            config.server.bind_address, config.server.port
        );
        println!();
        Ok(0)
    }
}
