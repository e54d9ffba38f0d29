//! Last-known-good snapshot cache
//!
//! One entry per adapter instance. Written after every successful fetch and
//! read only when a fetch fails for good.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Mutex;

/// Items of the last successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub items: Vec<Value>,
    pub fetched_at: DateTime<Utc>,
}

/// Single-slot snapshot cache
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: Mutex<Option<Snapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached snapshot
    pub fn store(&self, items: Vec<Value>) {
        let snapshot = Snapshot {
            items,
            fetched_at: Utc::now(),
        };
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot);
    }

    /// Returns a copy of the cached snapshot, if any
    pub fn get(&self) -> Option<Snapshot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).is_none()
    }
}
