//! Market record models
//!
//! Canonical records are the unified, validated observations keyed by
//! `(symbol, timestamp)`. Raw and quarantined records are append-only audit
//! documents.

use super::ids::{RunId, SourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Unified market observation
///
/// # Examples
///
/// ```
/// use marketflow::domain::{CanonicalRecord, SourceKind};
/// use chrono::Utc;
///
/// let record = CanonicalRecord::new("BTC", Some(68500.5), Some(1200.0), SourceKind::Csv, Utc::now());
/// assert!(record.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Normalized ticker symbol
    pub symbol: String,

    /// Price in USD
    pub price_usd: Option<f64>,

    /// Traded volume
    pub volume: Option<f64>,

    /// Source the record was extracted from
    pub source: SourceKind,

    /// Observation time
    pub timestamp: DateTime<Utc>,

    /// Echo of the raw payload the record was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl CanonicalRecord {
    /// Creates a record without metadata
    pub fn new(
        symbol: impl Into<String>,
        price_usd: Option<f64>,
        volume: Option<f64>,
        source: SourceKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price_usd,
            volume,
            source,
            timestamp,
            metadata: None,
        }
    }

    /// Attaches the raw payload echo
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Upsert key: one logical observation per `(symbol, timestamp)`
    pub fn key(&self) -> RecordKey {
        RecordKey {
            symbol: self.symbol.clone(),
            timestamp_ms: self.timestamp.timestamp_millis(),
        }
    }

    /// Non-empty symbol and a finite price
    ///
    /// Any representable timestamp is valid, including dates before 1970.
    pub fn is_valid(&self) -> bool {
        self.invalid_reason().is_none()
    }

    /// Describes why the record fails validation, if it does
    pub fn invalid_reason(&self) -> Option<&'static str> {
        if self.symbol.trim().is_empty() {
            return Some("missing symbol");
        }
        match self.price_usd {
            None => Some("missing price"),
            Some(price) if !price.is_finite() => Some("non-finite price"),
            Some(_) => None,
        }
    }
}

/// Unique key of a canonical record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Normalized symbol
    pub symbol: String,
    /// Timestamp in Unix milliseconds
    pub timestamp_ms: i64,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timestamp_ms)
    }
}

/// Raw per-item payload kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Run that ingested the payload
    pub run_id: RunId,

    /// Source the payload came from
    pub source: SourceKind,

    /// Opaque payload
    pub data: Value,

    /// Ingestion time
    pub ingested_at: DateTime<Utc>,
}

impl RawRecord {
    /// Wraps a payload with the current ingestion time
    pub fn new(run_id: RunId, source: SourceKind, data: Value) -> Self {
        Self {
            run_id,
            source,
            data,
            ingested_at: Utc::now(),
        }
    }
}

/// Why a payload was quarantined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    /// Header drift too large to reconcile
    LowConfidenceSchema,
    /// Record failed the validity filter
    ValidationError,
    /// Anything else
    Other,
}

impl QuarantineReason {
    /// Stored name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineReason::LowConfidenceSchema => "low_confidence_schema",
            QuarantineReason::ValidationError => "validation_error",
            QuarantineReason::Other => "other",
        }
    }

    /// Parses a stored reason name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low_confidence_schema" => Some(QuarantineReason::LowConfidenceSchema),
            "validation_error" => Some(QuarantineReason::ValidationError),
            "other" => Some(QuarantineReason::Other),
            _ => None,
        }
    }
}

/// Rejected payload held for inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedRecord {
    /// Run that rejected the payload
    pub run_id: RunId,

    /// Source the payload came from
    pub source: SourceKind,

    /// Rejection reason
    pub reason: QuarantineReason,

    /// Opaque payload
    pub payload: Value,

    /// Schema confidence, when the rejection came from the reconciler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,

    /// Free-form detail (e.g. which validation rule failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// When the payload was quarantined
    pub created_at: DateTime<Utc>,
}

impl QuarantinedRecord {
    /// Creates a quarantine entry stamped with the current time
    pub fn new(run_id: RunId, source: SourceKind, reason: QuarantineReason, payload: Value) -> Self {
        Self {
            run_id,
            source,
            reason,
            payload,
            confidence_score: None,
            detail: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the schema confidence
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = Some(confidence);
        self
    }

    /// Sets the detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_record() {
        let record = CanonicalRecord::new("BTC", Some(1.0), None, SourceKind::Csv, ts());
        assert!(record.is_valid());
        assert_eq!(record.invalid_reason(), None);
    }

    #[test]
    fn test_invalid_records() {
        let empty_symbol = CanonicalRecord::new(" ", Some(1.0), None, SourceKind::Csv, ts());
        assert_eq!(empty_symbol.invalid_reason(), Some("missing symbol"));

        let no_price = CanonicalRecord::new("BTC", None, None, SourceKind::Csv, ts());
        assert_eq!(no_price.invalid_reason(), Some("missing price"));

        let nan_price = CanonicalRecord::new("BTC", Some(f64::NAN), None, SourceKind::Csv, ts());
        assert_eq!(nan_price.invalid_reason(), Some("non-finite price"));

    }

    #[test]
    fn test_pre_epoch_timestamp_is_valid() {
        let landing = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 0).unwrap();
        let record = CanonicalRecord::new("BTC", Some(1.0), None, SourceKind::Csv, landing);
        assert!(record.is_valid());

        let epoch = CanonicalRecord::new(
            "BTC",
            Some(1.0),
            None,
            SourceKind::Csv,
            Utc.timestamp_millis_opt(0).unwrap(),
        );
        assert!(epoch.is_valid());
    }

    #[test]
    fn test_key_ignores_source_and_price() {
        let a = CanonicalRecord::new("ETH", Some(1.0), None, SourceKind::Csv, ts());
        let b = CanonicalRecord::new("ETH", Some(2.0), Some(3.0), SourceKind::AssetsApi, ts());
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string(), format!("ETH@{}", ts().timestamp_millis()));
    }

    #[test]
    fn test_quarantine_builder() {
        let entry = QuarantinedRecord::new(
            RunId::generate(),
            SourceKind::Csv,
            QuarantineReason::LowConfidenceSchema,
            serde_json::json!({"column_a": "x"}),
        )
        .with_confidence(0.42)
        .with_detail("headers unrelated");

        assert_eq!(entry.confidence_score, Some(0.42));
        assert_eq!(entry.reason.as_str(), "low_confidence_schema");
        assert_eq!(entry.detail.as_deref(), Some("headers unrelated"));
    }
}
