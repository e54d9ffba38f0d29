//! Domain identifier types
//!
//! Newtype wrappers for run identifiers plus the closed set of source kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Run identifier newtype wrapper
///
/// Format: `run_{uuid}`.
///
/// # Examples
///
/// ```
/// use marketflow::domain::ids::RunId;
///
/// let run_id = RunId::generate();
/// assert!(run_id.as_str().starts_with("run_"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a new RunId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Run ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Generates a fresh random run identifier
    pub fn generate() -> Self {
        Self(format!("run_{}", Uuid::new_v4()))
    }

    /// Returns the run ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The sources a run extracts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Remote asset list API (CoinCap style)
    AssetsApi,
    /// Local header-delimited file
    Csv,
    /// Remote ticker API with heterogeneous field names
    TickersApi,
}

impl SourceKind {
    /// All source kinds in extraction order
    pub const ALL: [SourceKind; 3] = [
        SourceKind::AssetsApi,
        SourceKind::Csv,
        SourceKind::TickersApi,
    ];

    /// Stable name used as source tag, limiter key and store value
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::AssetsApi => "assets_api",
            SourceKind::Csv => "csv",
            SourceKind::TickersApi => "tickers_api",
        }
    }

    /// Whether this source supports offset-based resume
    pub fn is_resumable(&self) -> bool {
        matches!(self, SourceKind::Csv)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assets_api" => Ok(SourceKind::AssetsApi),
            "csv" => Ok(SourceKind::Csv),
            "tickers_api" => Ok(SourceKind::TickersApi),
            other => Err(format!(
                "Unknown source '{other}'. Must be one of: assets_api, csv, tickers_api"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_rejects_empty() {
        assert!(RunId::new("  ").is_err());
        assert_eq!(RunId::new("run_1").unwrap().as_str(), "run_1");
    }

    #[test]
    fn test_generated_run_ids_are_distinct() {
        assert_ne!(RunId::generate(), RunId::generate());
    }

    #[test]
    fn test_source_kind_round_trip_names() {
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(SourceKind::from_str("ftp").is_err());
    }

    #[test]
    fn test_source_kind_serde_names() {
        let json = serde_json::to_string(&SourceKind::TickersApi).unwrap();
        assert_eq!(json, "\"tickers_api\"");
        let kind: SourceKind = serde_json::from_str("\"csv\"").unwrap();
        assert_eq!(kind, SourceKind::Csv);
    }

    #[test]
    fn test_only_csv_is_resumable() {
        assert!(SourceKind::Csv.is_resumable());
        assert!(!SourceKind::AssetsApi.is_resumable());
        assert!(!SourceKind::TickersApi.is_resumable());
    }
}
