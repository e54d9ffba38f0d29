//! Domain error types
//!
//! This module defines the error hierarchy for Marketflow. Source and store
//! failures get their own enums so the orchestrator can tell an extraction
//! failure apart from a persistence failure.

use thiserror::Error;

/// Main Marketflow error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum MarketflowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source extraction errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Store (persistence) errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Schema reconciliation errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A run is already executing in this process
    #[error("Run already in progress: {0}")]
    RunInProgress(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Errors raised by source adapters
///
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Remote answered 429
    #[error("Rate limited by {source_name}: {message}")]
    RateLimited {
        source_name: String,
        message: String,
    },

    /// Remote answered 5xx
    #[error("Server error from {source_name}: {status} - {message}")]
    ServerError {
        source_name: String,
        status: u16,
        message: String,
    },

    /// Remote answered any other non-success status
    #[error("Client error from {source_name}: {status} - {message}")]
    ClientError {
        source_name: String,
        status: u16,
        message: String,
    },

    /// Request timed out at the transport layer
    #[error("Request to {source_name} timed out: {message}")]
    Timeout {
        source_name: String,
        message: String,
    },

    /// Connection could not be established
    #[error("Failed to connect to {source_name}: {message}")]
    ConnectionFailed {
        source_name: String,
        message: String,
    },

    /// Payload could not be decoded
    #[error("Invalid payload from {source_name}: {message}")]
    InvalidPayload {
        source_name: String,
        message: String,
    },

    /// File source could not be read
    #[error("Failed to read {path}: {message}")]
    FileRead { path: String, message: String },

    /// Retries exhausted and no cached snapshot available
    #[error("{source_name} unavailable after {attempts} attempt(s) and no cached snapshot: {last_error}")]
    Exhausted {
        source_name: String,
        attempts: usize,
        last_error: String,
    },
}

impl SourceError {
    /// Whether the failure may succeed on retry (429, 5xx, transport timeout)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. }
                | SourceError::ServerError { .. }
                | SourceError::Timeout { .. }
        )
    }
}

/// Errors raised by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach the store
    #[error("Failed to connect to store: {0}")]
    ConnectionFailed(String),

    /// A read query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A write was rejected
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// A unique key constraint was violated
    #[error("Duplicate key for {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    /// A stored document could not be decoded
    #[error("Failed to decode stored document: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether this error is a unique-key violation
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for MarketflowError {
    fn from(err: std::io::Error) -> Self {
        MarketflowError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MarketflowError {
    fn from(err: serde_json::Error) -> Self {
        MarketflowError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MarketflowError {
    fn from(err: toml::de::Error) -> Self {
        MarketflowError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv errors
impl From<csv::Error> for MarketflowError {
    fn from(err: csv::Error) -> Self {
        MarketflowError::Serialization(format!("CSV error: {err}"))
    }
}
