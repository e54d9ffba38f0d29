//! Integration tests for configuration loading and validation
//!
//! Tests that modify environment variables hold `ENV_MUTEX` so they do not
//! interfere with each other.

use marketflow::config::{load_config, StoreBackend};
use marketflow::domain::SourceKind;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    std::env::remove_var("MARKETFLOW_APPLICATION_LOG_LEVEL");
    std::env::remove_var("MARKETFLOW_LOAD_BATCH_SIZE");
    std::env::remove_var("MARKETFLOW_SOURCES_CSV_PATH");
    std::env::remove_var("MARKETFLOW_SERVER_PORT");
    std::env::remove_var("MARKETFLOW_STORE_BACKEND");
    std::env::remove_var("TEST_TICKERS_KEY");
}

fn write_config(toml_content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    cleanup_env_vars();

    let temp_file = write_config(
        r#"
[application]
log_level = "debug"

[sources.assets]
base_url = "https://assets.example.com/v2"
limit = 25
timeout_seconds = 5

[sources.assets.retry]
max_retries = 5
initial_backoff_ms = 250

[sources.tickers]
base_url = "https://tickers.example.com"
path = "/v1/tickers"
api_key = "plain-key"
api_key_header = "X-Market-Key"

[sources.csv]
path = "/data/market.csv"
delimiter = ";"

[rate_limit]
poll_interval_ms = 50

[rate_limit.default]
capacity = 5
tokens_per_interval = 5
interval_ms = 1000

[rate_limit.sources.tickers_api]
capacity = 1
tokens_per_interval = 1
interval_ms = 2000

[schema]
drop_threshold = 0.75
exact_threshold = 1.0

[transform]
keep_metadata = false

[load]
batch_size = 250
store_raw = false

[run]
continue_on_source_failure = true
sources = ["csv", "tickers_api"]

[server]
bind_address = "127.0.0.1"
port = 8088

[logging]
local_enabled = false
local_path = "/tmp/marketflow"
local_rotation = "hourly"
"#,
    );

    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "debug");

    assert_eq!(config.sources.assets.base_url, "https://assets.example.com/v2");
    assert_eq!(config.sources.assets.limit, 25);
    assert_eq!(config.sources.assets.retry.max_retries, 5);
    assert_eq!(config.sources.assets.retry.initial_backoff_ms, 250);

    assert_eq!(config.sources.tickers.path, "/v1/tickers");
    assert_eq!(config.sources.tickers.api_key_header, "X-Market-Key");
    assert_eq!(
        config
            .sources
            .tickers
            .api_key
            .as_ref()
            .unwrap()
            .expose_secret()
            .as_str(),
        "plain-key"
    );

    assert_eq!(config.sources.csv.path, "/data/market.csv");
    assert_eq!(config.sources.csv.delimiter, ';');

    assert_eq!(config.rate_limit.poll_interval_ms, 50);
    assert_eq!(config.rate_limit.bucket_for(SourceKind::TickersApi).capacity, 1);
    assert_eq!(config.rate_limit.bucket_for(SourceKind::AssetsApi).capacity, 5);

    assert_eq!(config.schema.drop_threshold, 0.75);
    assert!(!config.transform.keep_metadata);
    assert_eq!(config.load.batch_size, 250);
    assert!(!config.load.store_raw);

    assert!(config.run.continue_on_source_failure);
    assert_eq!(
        config.active_sources(),
        vec![SourceKind::Csv, SourceKind::TickersApi]
    );

    assert_eq!(config.server.listen_address(), "127.0.0.1:8088");
    assert_eq!(config.logging.local_rotation, "hourly");
    assert_eq!(config.store.backend, StoreBackend::Memory);
}

#[test]
fn test_load_empty_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    cleanup_env_vars();

    let temp_file = write_config("");
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.sources.assets.limit, 10);
    assert_eq!(config.sources.tickers.path, "/tickers");
    assert_eq!(config.sources.csv.path, "market_data_source.csv");
    assert_eq!(config.schema.drop_threshold, 0.8);
    assert_eq!(config.schema.exact_threshold, 1.0);
    assert_eq!(
        config.schema.canonical_headers,
        vec!["ticker", "price_usd", "tx_volume", "time"]
    );
    assert_eq!(config.load.batch_size, 500);
    assert!(!config.run.continue_on_source_failure);
    assert_eq!(config.active_sources(), SourceKind::ALL.to_vec());
    assert_eq!(config.server.port, 3000);
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_TICKERS_KEY", "secret_key");

    let temp_file = write_config(
        r#"
[sources.tickers]
api_key = "${TEST_TICKERS_KEY}"
"#,
    );

    let config = load_config(temp_file.path()).expect("Failed to load config");
    assert_eq!(
        config
            .sources
            .tickers
            .api_key
            .as_ref()
            .unwrap()
            .expose_secret()
            .as_str(),
        "secret_key"
    );

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_variable_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    cleanup_env_vars();

    let temp_file = write_config(
        r#"
[sources.tickers]
api_key = "${TEST_TICKERS_KEY}"
"#,
    );

    let err = load_config(temp_file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_TICKERS_KEY"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    cleanup_env_vars();
    std::env::set_var("MARKETFLOW_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("MARKETFLOW_LOAD_BATCH_SIZE", "1000");
    std::env::set_var("MARKETFLOW_SOURCES_CSV_PATH", "/override/rows.csv");
    std::env::set_var("MARKETFLOW_SERVER_PORT", "9090");

    let temp_file = write_config(
        r#"
[application]
log_level = "info"

[load]
batch_size = 100

[sources.csv]
path = "rows.csv"
"#,
    );

    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "trace");
    assert_eq!(config.load.batch_size, 1000);
    assert_eq!(config.sources.csv.path, "/override/rows.csv");
    assert_eq!(config.server.port, 9090);

    cleanup_env_vars();
}

#[test]
fn test_invalid_override_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    cleanup_env_vars();
    std::env::set_var("MARKETFLOW_STORE_BACKEND", "mongodb");

    let temp_file = write_config("");
    let result = load_config(temp_file.path());
    assert!(result.is_err());

    cleanup_env_vars();
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    cleanup_env_vars();

    for toml_content in [
        "[application]\nlog_level = \"invalid_level\"",
        "[schema]\ndrop_threshold = 0.9\nexact_threshold = 0.5",
        "[load]\nbatch_size = 0",
        "[store]\nbackend = \"postgresql\"",
        "[sources.assets]\nenabled = false\n[sources.tickers]\nenabled = false\n[sources.csv]\nenabled = false",
        "[sources.assets]\nenabled = false\n[run]\nsources = [\"assets_api\"]",
    ] {
        let temp_file = write_config(toml_content);
        assert!(
            load_config(temp_file.path()).is_err(),
            "accepted invalid config: {toml_content}"
        );
    }
}

#[test]
fn test_missing_file_is_an_error() {
    let result = load_config("/nonexistent/marketflow.toml");
    assert!(result.unwrap_err().to_string().contains("not found"));
}
