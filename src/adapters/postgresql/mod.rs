//! PostgreSQL store backend
//!
//! Canonical records live in `market_records` keyed by `(symbol, ts)`;
//! bookkeeping tables enforce the checkpoint and schema-version keys.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
