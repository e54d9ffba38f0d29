//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "marketflow.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("Initializing Marketflow configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your source URLs and CSV path", self.output);
                println!("  2. Set MARKETFLOW_TICKERS_KEY in a .env file or the environment");
                println!("  3. For PostgreSQL: run migrations/001_initial_schema.sql or let the store create it");
                println!("  4. Validate configuration: marketflow validate-config");
                println!("  5. Run once: marketflow run, or start the endpoint: marketflow serve");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Marketflow Configuration File
# Market data ETL: Assets API, Tickers API and CSV file into one canonical store

[application]
log_level = "info"

[sources.assets]
enabled = true
base_url = "https://api.coincap.io/v2"
limit = 10

[sources.tickers]
enabled = true
base_url = "http://localhost:4000"
path = "/tickers"
api_key = "${MARKETFLOW_TICKERS_KEY}"

[sources.csv]
enabled = true
path = "market_data_source.csv"

[schema]
drop_threshold = 0.8
exact_threshold = 1.0

[load]
batch_size = 500

[store]
backend = "memory"

[server]
bind_address = "0.0.0.0"
port = 3000
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Marketflow Configuration File
# Market data ETL: Assets API, Tickers API and CSV file into one canonical store
#
# Every section is optional. Values of the form ${VAR} are substituted from
# the environment, and MARKETFLOW_<SECTION>_<KEY> variables override keys.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Sources
# ============================================================================
[sources.assets]
# Paginated asset list; requested as {base_url}/assets?limit={limit}
enabled = true
base_url = "https://api.coincap.io/v2"
limit = 10
timeout_seconds = 10
# api_key = "${MARKETFLOW_ASSETS_KEY}"

[sources.assets.retry]
# The k-th retry waits initial_backoff_ms * 2^(k-1)
max_retries = 3
initial_backoff_ms = 500

[sources.tickers]
# Authenticated tickers endpoint; the key is sent in api_key_header
enabled = true
base_url = "http://localhost:4000"
path = "/tickers"
api_key = "${MARKETFLOW_TICKERS_KEY}"
api_key_header = "X-API-Key"
timeout_seconds = 10

[sources.csv]
# Header-delimited file; headers are reconciled against schema.canonical_headers
enabled = true
path = "market_data_source.csv"
delimiter = ","

# ============================================================================
# Rate Limiting
# ============================================================================
[rate_limit]
# How often a throttled acquire re-checks its bucket
poll_interval_ms = 100

[rate_limit.default]
capacity = 10
tokens_per_interval = 10
interval_ms = 1000

# Per-source overrides, keyed by source name
# [rate_limit.sources.tickers_api]
# capacity = 2
# tokens_per_interval = 1
# interval_ms = 1000

# ============================================================================
# Schema Drift
# ============================================================================
[schema]
canonical_headers = ["ticker", "price_usd", "tx_volume", "time"]
# Below drop_threshold the batch is quarantined; at exact_threshold it passes
# unchanged; in between the fuzzy mapping is applied and versioned.
drop_threshold = 0.8
exact_threshold = 1.0

# ============================================================================
# Transform, Load and Run Policy
# ============================================================================
[transform]
# Keep unrecognized source fields in the record metadata
keep_metadata = true

[load]
# Upsert batch size (1-10000)
batch_size = 500
# Also persist every extracted record in the raw zone
store_raw = true

[run]
# Load the surviving sources when one source fails
continue_on_source_failure = false
# Restrict runs to these sources (empty = every enabled source)
sources = []

# ============================================================================
# Store
# ============================================================================
[store]
# memory | postgresql
backend = "memory"

# Uncomment when backend = "postgresql"
#
# [store.postgresql]
# connection_string = "${MARKETFLOW_DATABASE_URL}"
# max_connections = 10
# connection_timeout_seconds = 30
# statement_timeout_seconds = 60

# ============================================================================
# Trigger Endpoint (marketflow serve)
# ============================================================================
[server]
bind_address = "0.0.0.0"
port = 3000

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable local JSON file logging
local_enabled = false
local_path = "logs"
# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}
