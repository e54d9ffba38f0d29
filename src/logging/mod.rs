//! Logging and observability
//!
//! Structured logging through `tracing`:
//! - Console output with configurable level (`RUST_LOG` overrides)
//! - JSON-formatted rolling log files
//! - Helper macros for the run lifecycle events
//!
//! # Example
//!
//! ```no_run
//! use marketflow::logging::init_logging;
//! use marketflow::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(source = "csv", rows = 12, "Extracted");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a run
///
/// # Example
///
/// ```no_run
/// use marketflow::log_run_start;
/// use marketflow::domain::RunId;
///
/// let run_id = RunId::generate();
/// log_run_start!(&run_id, 3);
/// ```
#[macro_export]
macro_rules! log_run_start {
    ($run_id:expr, $source_count:expr) => {
        tracing::info!(
            run_id = %$run_id,
            sources = $source_count,
            "Starting ETL run"
        );
    };
}

/// Log the terminal state of a run
///
/// # Example
///
/// ```no_run
/// use marketflow::log_run_complete;
/// use marketflow::domain::Run;
///
/// let run = Run::start();
/// log_run_complete!(&run);
/// ```
#[macro_export]
macro_rules! log_run_complete {
    ($run:expr) => {
        tracing::info!(
            run_id = %$run.run_id,
            status = %$run.status,
            extracted = $run.stats.extracted,
            loaded = $run.stats.loaded,
            duplicates = $run.stats.duplicates,
            quarantined = $run.stats.quarantined,
            errors = $run.stats.errors,
            throttle_events = $run.stats.throttle_events,
            duration_ms = $run.duration_ms().unwrap_or_default(),
            "ETL run finished"
        );
    };
}

/// Log a retry attempt against a remote source
///
/// # Example
///
/// ```no_run
/// use marketflow::log_retry_attempt;
///
/// log_retry_attempt!("assets_api", 2, 3, 1000u64, "HTTP 503");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($source:expr, $attempt:expr, $max_attempts:expr, $backoff_ms:expr, $reason:expr) => {
        tracing::warn!(
            source = %$source,
            attempt = $attempt,
            max_attempts = $max_attempts,
            backoff_ms = $backoff_ms,
            reason = %$reason,
            "Retrying source request"
        );
    };
}

/// Log a failed token acquisition
///
/// # Example
///
/// ```no_run
/// use marketflow::log_throttled;
///
/// log_throttled!("tickers_api", 4u64);
/// ```
#[macro_export]
macro_rules! log_throttled {
    ($source:expr, $total:expr) => {
        tracing::debug!(
            source = %$source,
            throttle_events = $total,
            "Rate limited, waiting for token"
        );
    };
}
