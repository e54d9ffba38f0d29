//! Run lifecycle
//!
//! - [`orchestrator`] - the ETL pipeline and its state machine
//! - [`cursor`] - resume discovery for the file source
//! - [`summary`] - reporting on a finished run

pub mod cursor;
pub mod orchestrator;
pub mod summary;

pub use cursor::ResumeCursor;
pub use orchestrator::{RunOrchestrator, RunPermit};
pub use summary::RunSummary;
