//! Store abstraction layer
//!
//! This module provides a trait-based abstraction over the durable store,
//! allowing Marketflow to run against memory or PostgreSQL.

pub mod factory;
pub mod memory;
pub mod traits;

pub use factory::create_store;
pub use memory::InMemoryStore;
pub use traits::{MarketStore, UpsertOutcome};
