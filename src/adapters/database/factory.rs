//! Store factory
//!
//! Creates the store backend selected by `store.backend`.

use super::memory::InMemoryStore;
use super::traits::MarketStore;
use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::config::{MarketflowConfig, StoreBackend};
use crate::domain::{MarketflowError, Result};
use std::sync::Arc;

/// Create the configured store and make sure its schema exists
///
/// # Errors
///
/// Returns an error if the backend cannot be reached or initialized.
pub async fn create_store(config: &MarketflowConfig) -> Result<Arc<dyn MarketStore + Send + Sync>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Creating in-memory store");
            Ok(Arc::new(InMemoryStore::new()) as Arc<dyn MarketStore + Send + Sync>)
        }
        StoreBackend::PostgreSQL => {
            let pg_config = config.store.postgresql.as_ref().ok_or_else(|| {
                MarketflowError::Configuration(
                    "store.postgresql section is required when backend = postgresql".to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL store");
            let client = PostgreSQLClient::new(pg_config.clone())?;
            let adapter = PostgreSQLAdapter::new(client);
            adapter.test_connection().await?;
            adapter.ensure_schema().await?;

            Ok(Arc::new(adapter) as Arc<dyn MarketStore + Send + Sync>)
        }
    }
}
