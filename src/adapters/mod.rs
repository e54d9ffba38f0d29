//! External system integrations for Marketflow.
//!
//! - [`sources`] - market data sources (assets API, tickers API, CSV file)
//! - [`database`] - store abstraction (trait-based) and the in-memory backend
//! - [`postgresql`] - PostgreSQL store backend
//!
//! Adapters isolate external dependencies so the ETL core can be tested
//! against mock HTTP servers and the in-memory store.

pub mod database;
pub mod postgresql;
pub mod sources;
