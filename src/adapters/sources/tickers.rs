//! Tickers API adapter
//!
//! `GET {base_url}{path}`; ticker objects come with heterogeneous field
//! names, resolved later by the normalizer's fallback chains.

use super::http::{RemoteFetcher, RetryPolicy};
use super::{ExtractRequest, Extraction, SourceAdapter};
use crate::config::{SecretString, TickersSourceConfig};
use crate::core::ratelimit::RateLimiterRegistry;
use crate::domain::{Result, SourceKind};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

pub struct TickersApiAdapter {
    url: String,
    api_key: Option<SecretString>,
    api_key_header: String,
    fetcher: RemoteFetcher,
}

impl TickersApiAdapter {
    pub fn new(config: &TickersSourceConfig, limiter: Arc<RateLimiterRegistry>) -> Result<Self> {
        let fetcher = RemoteFetcher::new(
            SourceKind::TickersApi,
            Duration::from_secs(config.timeout_seconds),
            RetryPolicy::from(&config.retry),
            limiter,
        )?;

        Ok(Self {
            url: format!("{}{}", config.base_url.trim_end_matches('/'), config.path),
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            fetcher,
        })
    }
}

#[async_trait]
impl SourceAdapter for TickersApiAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::TickersApi
    }

    async fn extract(&self, _request: &ExtractRequest) -> Result<Extraction> {
        let fetched = self
            .fetcher
            .fetch_items(|client| {
                let request = client.get(&self.url);
                match &self.api_key {
                    Some(key) => request.header(
                        self.api_key_header.as_str(),
                        key.expose_secret().as_str(),
                    ),
                    None => request,
                }
            })
            .await?;

        tracing::info!(
            source = %SourceKind::TickersApi,
            items = fetched.items.len(),
            from_cache = fetched.from_cache,
            "Extracted tickers"
        );

        let mut extraction = Extraction::snapshot(SourceKind::TickersApi, fetched.items);
        extraction.from_cache = fetched.from_cache;
        extraction.fallback_reason = fetched.fallback_reason;
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{secret_string, RetryConfig};

    #[tokio::test]
    async fn test_sends_api_key_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/tickers")
            .match_header("x-api-key", "k-1")
            .with_status(200)
            .with_body(r#"[{"pair":"BTC-USD","last":"68000"}]"#)
            .expect(1)
            .create_async()
            .await;

        let config = TickersSourceConfig {
            base_url: server.url(),
            path: "/v1/tickers".to_string(),
            api_key: Some(secret_string("k-1".to_string())),
            ..Default::default()
        };
        let limiter = Arc::new(RateLimiterRegistry::from_config(&Default::default()));
        let adapter = TickersApiAdapter::new(&config, limiter).unwrap();

        let extraction = adapter.extract(&ExtractRequest::default()).await.unwrap();
        assert_eq!(extraction.items.len(), 1);
        assert_eq!(extraction.items[0]["pair"], "BTC-USD");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_fall_back_to_previous_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/tickers")
            .with_status(200)
            .with_body(r#"{"data":[{"symbol":"SOL","price":"150"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let config = TickersSourceConfig {
            base_url: server.url(),
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
            },
            ..Default::default()
        };
        let limiter = Arc::new(RateLimiterRegistry::from_config(&Default::default()));
        let adapter = TickersApiAdapter::new(&config, limiter).unwrap();

        let first = adapter.extract(&ExtractRequest::default()).await.unwrap();
        assert!(!first.from_cache);
        ok.assert_async().await;

        let down = server
            .mock("GET", "/tickers")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;
        let second = adapter.extract(&ExtractRequest::default()).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.items, first.items);
        down.assert_async().await;
    }
}
