//! Configuration management for Marketflow.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Marketflow uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MARKETFLOW_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation with precise error messages
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use marketflow::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("marketflow.toml")?;
//!
//! println!("Assets API: {}", config.sources.assets.base_url);
//! println!("CSV file: {}", config.sources.csv.path);
//! println!("Load batch size: {}", config.load.batch_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`SourcesConfig`] - Assets API, Tickers API and CSV file sources
//! - [`RateLimitConfig`] - Token buckets per source
//! - [`SchemaConfig`] - Canonical headers and drift thresholds
//! - [`LoadConfig`] / [`RunConfig`] - Batching and run policy
//! - [`StoreConfig`] - Store backend (memory or PostgreSQL)
//! - [`ServerConfig`] - Trigger endpoint
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [sources.assets]
//! base_url = "https://api.coincap.io/v2"
//! limit = 10
//!
//! [sources.tickers]
//! base_url = "https://tickers.example.com"
//! api_key = "${MARKETFLOW_TICKERS_KEY}"
//!
//! [sources.csv]
//! path = "market_data_source.csv"
//!
//! [store]
//! backend = "postgresql"
//!
//! [store.postgresql]
//! connection_string = "${MARKETFLOW_DATABASE_URL}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, AssetsSourceConfig, BucketConfig, CsvSourceConfig, LoadConfig,
    LoggingConfig, MarketflowConfig, PostgreSQLConfig, RateLimitConfig, RetryConfig, RunConfig,
    SchemaConfig, ServerConfig, SourcesConfig, StoreBackend, StoreConfig, TickersSourceConfig,
    TransformConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
