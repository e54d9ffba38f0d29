//! Outbound rate limiting
//!
//! A [`TokenBucket`] per source key, held by a [`RateLimiterRegistry`] that is
//! passed explicitly to the adapters that need it.

pub mod bucket;
pub mod registry;

pub use bucket::TokenBucket;
pub use registry::RateLimiterRegistry;
