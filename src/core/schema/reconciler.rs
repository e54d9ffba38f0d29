//! Header drift detection for tabular sources
//!
//! Confidence is the Sørensen–Dice coefficient of the comma-joined canonical
//! and observed header strings. Individual headers are matched on their
//! token-sorted form so reordered words still resolve.

use crate::adapters::database::MarketStore;
use crate::config::SchemaConfig;
use crate::domain::{Result, SchemaVersion, SourceKind};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of comparing observed headers to the canonical list
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Headers match the canonical names
    Exact { confidence: f64 },
    /// Drift resolved through a rename mapping (observed name to canonical)
    Mapped {
        confidence: f64,
        mappings: BTreeMap<String, String>,
    },
    /// Too different to trust; the batch must be dropped
    Dropped { confidence: f64 },
}

impl Reconciliation {
    pub fn confidence(&self) -> f64 {
        match self {
            Reconciliation::Exact { confidence }
            | Reconciliation::Mapped { confidence, .. }
            | Reconciliation::Dropped { confidence } => *confidence,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, Reconciliation::Dropped { .. })
    }
}

/// Compares observed tabular headers against the canonical header list
#[derive(Debug, Clone)]
pub struct SchemaReconciler {
    canonical: Vec<String>,
    drop_threshold: f64,
    exact_threshold: f64,
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

fn joined(headers: &[String]) -> String {
    headers
        .iter()
        .map(|h| normalize_header(h))
        .collect::<Vec<_>>()
        .join(",")
}

/// Lowercased alphanumeric tokens of a header, sorted
fn token_key(header: &str) -> String {
    let mut tokens: Vec<String> = header
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    tokens.sort();
    tokens.join(" ")
}

/// Similarity of two header names on their token-sorted form
pub fn header_similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&token_key(a), &token_key(b))
}

impl SchemaReconciler {
    pub fn new(canonical: Vec<String>, drop_threshold: f64, exact_threshold: f64) -> Self {
        Self {
            canonical,
            drop_threshold,
            exact_threshold,
        }
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        Self::new(
            config.canonical_headers.clone(),
            config.drop_threshold,
            config.exact_threshold,
        )
    }

    pub fn canonical_headers(&self) -> &[String] {
        &self.canonical
    }

    /// Batch confidence in `[0, 1]`
    pub fn confidence(&self, observed: &[String]) -> f64 {
        strsim::sorensen_dice(&joined(&self.canonical), &joined(observed))
    }

    /// Classifies the observed headers
    pub fn assess(&self, observed: &[String]) -> Reconciliation {
        let confidence = self.confidence(observed);

        if confidence >= self.exact_threshold {
            Reconciliation::Exact { confidence }
        } else if confidence < self.drop_threshold {
            Reconciliation::Dropped { confidence }
        } else {
            Reconciliation::Mapped {
                confidence,
                mappings: self.rename_mapping(observed),
            }
        }
    }

    /// Maps drifted observed headers back to canonical names
    ///
    /// Observed headers already equal to a canonical name are never renamed.
    /// Each canonical and each observed header is used at most once, best
    /// score first.
    pub fn rename_mapping(&self, observed: &[String]) -> BTreeMap<String, String> {
        let canonical_lower: Vec<String> =
            self.canonical.iter().map(|c| normalize_header(c)).collect();

        let missing: Vec<&String> = self
            .canonical
            .iter()
            .filter(|c| !observed.iter().any(|o| normalize_header(o) == normalize_header(c)))
            .collect();
        let candidates: Vec<&String> = observed
            .iter()
            .filter(|o| !canonical_lower.contains(&normalize_header(o)))
            .collect();

        let mut pairs: Vec<(f64, &String, &String)> = Vec::new();
        for canonical in &missing {
            for candidate in &candidates {
                let score = header_similarity(candidate, canonical);
                if score >= self.drop_threshold {
                    pairs.push((score, *candidate, *canonical));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut mappings = BTreeMap::new();
        let mut used_canonical: Vec<&String> = Vec::new();
        for (_, observed_name, canonical) in pairs {
            let observed_name = observed_name.trim();
            if mappings.contains_key(observed_name) || used_canonical.contains(&canonical) {
                continue;
            }
            mappings.insert(observed_name.to_string(), canonical.clone());
            used_canonical.push(canonical);
        }

        mappings
    }
}

/// Renames fields of every object item according to `mappings`
pub fn apply_mapping(items: &mut [Value], mappings: &BTreeMap<String, String>) {
    if mappings.is_empty() {
        return;
    }
    for item in items.iter_mut() {
        if let Value::Object(fields) = item {
            for (observed, canonical) in mappings {
                if let Some(value) = fields.remove(observed) {
                    fields.insert(canonical.clone(), value);
                }
            }
        }
    }
}

/// Version number for a new schema version of a source
///
/// The creation time in Unix milliseconds, bumped past the latest stored
/// version when the clock has not moved on.
pub fn next_version(latest: Option<i64>, now_ms: i64) -> i64 {
    match latest {
        Some(latest) if latest >= now_ms => latest + 1,
        _ => now_ms,
    }
}

/// Persists one schema version describing a reconciled drift
pub async fn record_schema_version(
    store: &(dyn MarketStore + Send + Sync),
    source: SourceKind,
    observed: &[String],
    mappings: &BTreeMap<String, String>,
    confidence: f64,
) -> Result<SchemaVersion> {
    let latest = store.latest_schema_version(source).await?;
    let created_at = Utc::now();
    let version = SchemaVersion {
        source,
        version: next_version(latest.map(|v| v.version), created_at.timestamp_millis()),
        headers: observed.to_vec(),
        mappings: mappings.clone(),
        confidence,
        created_at,
    };

    store.create_schema_version(&version).await?;

    tracing::info!(
        source = %source,
        version = version.version,
        confidence,
        mappings = ?version.mappings,
        "Schema version recorded"
    );

    Ok(version)
}
