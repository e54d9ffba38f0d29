//! Normalization and validation
//!
//! Every source's raw items are mapped to [`CanonicalRecord`]s through the
//! source's [`FieldRules`]. The combined set then goes through one validity
//! filter; rejected records keep their raw payload for the quarantine sink.

pub mod rules;

pub use rules::{normalize_symbol, parse_number, parse_timestamp, FieldRules};

use crate::config::TransformConfig;
use crate::domain::{CanonicalRecord, SourceKind};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A record that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub source: SourceKind,
    pub payload: Value,
    pub reason: String,
}

/// Records retained for loading and those filtered out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub records: Vec<CanonicalRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Raw items of one source, ready to normalize
#[derive(Debug, Clone, Copy)]
pub struct SourceBatch<'a> {
    pub source: SourceKind,
    pub items: &'a [Value],
}

/// Maps raw items to canonical records
#[derive(Debug, Clone)]
pub struct Normalizer {
    keep_metadata: bool,
}

impl Normalizer {
    pub fn new(keep_metadata: bool) -> Self {
        Self { keep_metadata }
    }

    pub fn from_config(config: &TransformConfig) -> Self {
        Self::new(config.keep_metadata)
    }

    /// Maps one raw item; the result may still be invalid
    ///
    /// A missing or unparseable timestamp falls back to `now`.
    pub fn normalize_item(
        &self,
        source: SourceKind,
        item: &Value,
        now: DateTime<Utc>,
    ) -> CanonicalRecord {
        let empty = Map::new();
        let fields = item.as_object().unwrap_or(&empty);
        let rules = FieldRules::for_source(source);

        let symbol = rules::first_text(fields, rules.symbol)
            .map(|raw| normalize_symbol(&raw))
            .unwrap_or_default();
        let price = rules::first_number(fields, rules.price);
        let volume = rules::first_number(fields, rules.volume);
        let timestamp = rules::first_timestamp(fields, rules.timestamp).unwrap_or(now);

        let record = CanonicalRecord::new(symbol, price, volume, source, timestamp);
        if self.keep_metadata {
            record.with_metadata(item.clone())
        } else {
            record
        }
    }

    /// Normalizes every batch, then applies the validity filter to the
    /// combined set
    pub fn transform(&self, batches: &[SourceBatch<'_>], now: DateTime<Utc>) -> TransformOutput {
        let mut output = TransformOutput::default();

        let normalized = batches.iter().flat_map(|batch| {
            batch
                .items
                .iter()
                .map(move |item| (batch.source, item, self.normalize_item(batch.source, item, now)))
        });

        for (source, item, record) in normalized {
            match record.invalid_reason() {
                None => output.records.push(record),
                Some(reason) => {
                    tracing::debug!(source = %source, reason, "Record failed validation");
                    output.rejected.push(RejectedRecord {
                        source,
                        payload: item.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            valid = output.records.len(),
            rejected = output.rejected.len(),
            "Normalized records"
        );

        output
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(true)
    }
}
