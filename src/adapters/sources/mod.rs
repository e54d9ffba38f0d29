//! Source adapters
//!
//! Each adapter pulls raw items from one source. The two remote adapters share
//! [`http::RemoteFetcher`] (rate limiting, retry with doubling backoff and a
//! last-known-good snapshot); the CSV adapter reads rows from an offset.

pub mod assets;
pub mod cache;
pub mod csv_file;
pub mod http;
pub mod tickers;

pub use assets::AssetsApiAdapter;
pub use cache::{Snapshot, SnapshotCache};
pub use csv_file::CsvFileAdapter;
pub use http::{RemoteFetcher, RemoteItems, RetryPolicy};
pub use tickers::TickersApiAdapter;

use crate::config::MarketflowConfig;
use crate::core::ratelimit::RateLimiterRegistry;
use crate::domain::{Result, SourceKind};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// What to extract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractRequest {
    /// Rows to skip; only honored by resumable sources
    pub offset: u64,
}

/// Raw items pulled from one source
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub source: SourceKind,
    /// Raw items (JSON objects)
    pub items: Vec<Value>,
    /// Observed header row, for tabular sources
    pub headers: Option<Vec<String>>,
    /// Offset the extraction started at
    pub start_offset: u64,
    /// Offset after the last item consumed
    pub next_offset: u64,
    /// Served from the last-known-good snapshot
    pub from_cache: bool,
    /// Why the live fetch failed, when served from cache
    pub fallback_reason: Option<String>,
    /// Rows read but not decodable; they count as consumed
    pub malformed: Vec<MalformedItem>,
}

/// A raw row the adapter could not decode
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedItem {
    /// Best-effort rendering of the row
    pub payload: Value,
    pub reason: String,
}

impl Extraction {
    /// An extraction of a non-resumable source
    pub fn snapshot(source: SourceKind, items: Vec<Value>) -> Self {
        let next_offset = items.len() as u64;
        Self {
            source,
            items,
            headers: None,
            start_offset: 0,
            next_offset,
            from_cache: false,
            fallback_reason: None,
            malformed: Vec::new(),
        }
    }
}

/// A source of raw market items
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source this adapter reads
    fn source(&self) -> SourceKind;

    /// Pulls the current items
    ///
    /// # Errors
    ///
    /// Returns a source error when the source cannot be read and no cached
    /// snapshot is available.
    async fn extract(&self, request: &ExtractRequest) -> Result<Extraction>;
}

/// Builds the adapters for every active source in the configuration
pub fn build_adapters(
    config: &MarketflowConfig,
    limiter: Arc<RateLimiterRegistry>,
) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    for kind in config.active_sources() {
        let adapter: Arc<dyn SourceAdapter> = match kind {
            SourceKind::AssetsApi => Arc::new(AssetsApiAdapter::new(
                &config.sources.assets,
                limiter.clone(),
            )?),
            SourceKind::TickersApi => Arc::new(TickersApiAdapter::new(
                &config.sources.tickers,
                limiter.clone(),
            )?),
            SourceKind::Csv => Arc::new(CsvFileAdapter::new(&config.sources.csv)),
        };
        adapters.push(adapter);
    }

    tracing::debug!(
        sources = ?adapters.iter().map(|a| a.source()).collect::<Vec<_>>(),
        "Source adapters built"
    );

    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_adapters_follows_active_sources() {
        let mut config = MarketflowConfig::default();
        config.sources.tickers.enabled = false;
        let limiter = Arc::new(RateLimiterRegistry::from_config(&config.rate_limit));

        let adapters = build_adapters(&config, limiter).unwrap();
        let kinds: Vec<_> = adapters.iter().map(|a| a.source()).collect();
        assert_eq!(kinds, vec![SourceKind::AssetsApi, SourceKind::Csv]);
    }

    #[test]
    fn test_snapshot_extraction_offsets() {
        let extraction = Extraction::snapshot(
            SourceKind::TickersApi,
            vec![serde_json::json!({}), serde_json::json!({})],
        );
        assert_eq!(extraction.start_offset, 0);
        assert_eq!(extraction.next_offset, 2);
        assert!(extraction.headers.is_none());
    }
}
