//! Domain models and types for Marketflow.
//!
//! This module contains the records, run bookkeeping and error types shared by
//! every layer of the pipeline.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Identifiers** ([`RunId`], [`SourceKind`])
//! - **Records** ([`CanonicalRecord`], [`RawRecord`], [`QuarantinedRecord`])
//! - **Run bookkeeping** ([`Run`], [`Checkpoint`], [`SchemaVersion`])
//! - **Error types** ([`MarketflowError`], [`SourceError`], [`StoreError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, MarketflowError>`]:
//!
//! ```rust
//! use marketflow::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let _config = marketflow::config::MarketflowConfig::from_file("marketflow.toml")?;
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod errors;
pub mod ids;
pub mod records;
pub mod result;
pub mod run;

pub use checkpoint::{Checkpoint, CheckpointStatus, SchemaVersion};
pub use errors::{MarketflowError, SourceError, StoreError};
pub use ids::{RunId, SourceKind};
pub use records::{CanonicalRecord, QuarantineReason, QuarantinedRecord, RawRecord, RecordKey};
pub use result::Result;
pub use run::{ResumePointer, Run, RunErrorEntry, RunStats, RunStatus};
