//! Assets list API adapter
//!
//! `GET {base_url}/assets?limit={limit}`; the payload is either a bare array
//! of asset objects or `{ "data": [...] }`.

use super::http::{RemoteFetcher, RetryPolicy};
use super::{ExtractRequest, Extraction, SourceAdapter};
use crate::config::AssetsSourceConfig;
use crate::core::ratelimit::RateLimiterRegistry;
use crate::domain::{Result, SourceKind};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

/// Adapter for the assets list API
pub struct AssetsApiAdapter {
    url: String,
    limit: usize,
    api_key: Option<crate::config::SecretString>,
    fetcher: RemoteFetcher,
}

impl AssetsApiAdapter {
    /// Creates the adapter from its configuration section
    pub fn new(config: &AssetsSourceConfig, limiter: Arc<RateLimiterRegistry>) -> Result<Self> {
        let fetcher = RemoteFetcher::new(
            SourceKind::AssetsApi,
            Duration::from_secs(config.timeout_seconds),
            RetryPolicy::from(&config.retry),
            limiter,
        )?;

        Ok(Self {
            url: format!("{}/assets", config.base_url.trim_end_matches('/')),
            limit: config.limit,
            api_key: config.api_key.clone(),
            fetcher,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceAdapter for AssetsApiAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::AssetsApi
    }

    async fn extract(&self, _request: &ExtractRequest) -> Result<Extraction> {
        let limit = self.limit.to_string();
        let fetched = self
            .fetcher
            .fetch_items(|client| {
                let request = client.get(&self.url).query(&[("limit", limit.as_str())]);
                match &self.api_key {
                    Some(key) => request.bearer_auth(key.expose_secret().as_str()),
                    None => request,
                }
            })
            .await?;

        tracing::info!(
            source = %SourceKind::AssetsApi,
            items = fetched.items.len(),
            from_cache = fetched.from_cache,
            "Extracted assets"
        );

        let mut extraction = Extraction::snapshot(SourceKind::AssetsApi, fetched.items);
        extraction.from_cache = fetched.from_cache;
        extraction.fallback_reason = fetched.fallback_reason;
        Ok(extraction)
    }
}
