//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{MarketflowConfig, StoreBackend};
use super::secret::secret_string;
use crate::domain::errors::MarketflowError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MarketflowConfig
/// 4. Applies environment variable overrides (MARKETFLOW_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use marketflow::config::loader::load_config;
///
/// let config = load_config("marketflow.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MarketflowConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MarketflowError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MarketflowError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Same as [`load_config`] for an in-memory document
pub fn load_config_from_str(contents: &str) -> Result<MarketflowConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MarketflowConfig = toml::from_str(&contents)
        .map_err(|e| MarketflowError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        MarketflowError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

impl MarketflowConfig {
    /// Loads and validates a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_config(path)
    }
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched. All missing variables are reported at once.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MarketflowError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MarketflowError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val.trim().parse().map(Some).map_err(|_| {
            MarketflowError::Configuration(format!("Invalid value '{val}' for {name}"))
        }),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using MARKETFLOW_* prefix
///
/// Environment variables follow the pattern: MARKETFLOW_<SECTION>_<KEY>
/// For example: MARKETFLOW_SOURCES_ASSETS_BASE_URL, MARKETFLOW_LOAD_BATCH_SIZE
fn apply_env_overrides(config: &mut MarketflowConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("MARKETFLOW_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Source overrides
    if let Some(val) = env_parse("MARKETFLOW_SOURCES_ASSETS_ENABLED")? {
        config.sources.assets.enabled = val;
    }
    if let Ok(val) = std::env::var("MARKETFLOW_SOURCES_ASSETS_BASE_URL") {
        config.sources.assets.base_url = val;
    }
    if let Some(val) = env_parse("MARKETFLOW_SOURCES_ASSETS_LIMIT")? {
        config.sources.assets.limit = val;
    }
    if let Ok(val) = std::env::var("MARKETFLOW_SOURCES_ASSETS_API_KEY") {
        config.sources.assets.api_key = Some(secret_string(val));
    }
    if let Some(val) = env_parse("MARKETFLOW_SOURCES_TICKERS_ENABLED")? {
        config.sources.tickers.enabled = val;
    }
    if let Ok(val) = std::env::var("MARKETFLOW_SOURCES_TICKERS_BASE_URL") {
        config.sources.tickers.base_url = val;
    }
    if let Ok(val) = std::env::var("MARKETFLOW_SOURCES_TICKERS_API_KEY") {
        config.sources.tickers.api_key = Some(secret_string(val));
    }
    if let Some(val) = env_parse("MARKETFLOW_SOURCES_CSV_ENABLED")? {
        config.sources.csv.enabled = val;
    }
    if let Ok(val) = std::env::var("MARKETFLOW_SOURCES_CSV_PATH") {
        config.sources.csv.path = val;
    }

    // Rate limit overrides
    if let Some(val) = env_parse("MARKETFLOW_RATE_LIMIT_POLL_INTERVAL_MS")? {
        config.rate_limit.poll_interval_ms = val;
    }

    // Load and run overrides
    if let Some(val) = env_parse("MARKETFLOW_LOAD_BATCH_SIZE")? {
        config.load.batch_size = val;
    }
    if let Some(val) = env_parse("MARKETFLOW_RUN_CONTINUE_ON_SOURCE_FAILURE")? {
        config.run.continue_on_source_failure = val;
    }

    // Store overrides
    if let Ok(val) = std::env::var("MARKETFLOW_STORE_BACKEND") {
        config.store.backend = match val.to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgresql" => StoreBackend::PostgreSQL,
            other => {
                return Err(MarketflowError::Configuration(format!(
                    "Invalid MARKETFLOW_STORE_BACKEND '{other}'. Must be one of: memory, postgresql"
                )))
            }
        };
    }
    if let Some(ref mut pg) = config.store.postgresql {
        if let Ok(val) = std::env::var("MARKETFLOW_STORE_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(val) = env_parse("MARKETFLOW_STORE_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = val;
        }
    }

    // Server overrides
    if let Ok(val) = std::env::var("MARKETFLOW_SERVER_BIND_ADDRESS") {
        config.server.bind_address = val;
    }
    if let Some(val) = env_parse("MARKETFLOW_SERVER_PORT")? {
        config.server.port = val;
    }

    // Logging overrides
    if let Some(val) = env_parse("MARKETFLOW_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Ok(val) = std::env::var("MARKETFLOW_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
