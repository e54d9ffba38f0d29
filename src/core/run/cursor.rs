//! Resume cursor for the resumable source
//!
//! A run picks up where the most recent unfinished run left off: that run's
//! highest completed checkpoint for the source gives the starting offset.

use crate::adapters::database::MarketStore;
use crate::adapters::sources::ExtractRequest;
use crate::core::load::CheckpointPlan;
use crate::domain::{ResumePointer, Result, RunId, SourceKind};

/// Where a run resumes reading one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeCursor {
    source: SourceKind,
    /// Run the position was inherited from
    from_run: Option<RunId>,
    pointer: Option<ResumePointer>,
}

impl ResumeCursor {
    /// A cursor starting at the beginning of the source
    pub fn fresh(source: SourceKind) -> Self {
        Self {
            source,
            from_run: None,
            pointer: None,
        }
    }

    /// Locates the resume position for `source` on behalf of run `current`
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookups fail.
    pub async fn discover(
        store: &(dyn MarketStore + Send + Sync),
        current: &RunId,
        source: SourceKind,
    ) -> Result<Self> {
        let Some(previous) = store.latest_unfinished_run(current).await? else {
            tracing::debug!(run_id = %current, source = %source, "No unfinished run to resume");
            return Ok(Self::fresh(source));
        };

        let checkpoint = store
            .latest_completed_checkpoint(&previous.run_id, source)
            .await?;

        let Some(checkpoint) = checkpoint else {
            tracing::debug!(
                run_id = %current,
                previous_run = %previous.run_id,
                source = %source,
                "Unfinished run has no completed checkpoint"
            );
            return Ok(Self {
                source,
                from_run: Some(previous.run_id),
                pointer: None,
            });
        };

        tracing::info!(
            run_id = %current,
            previous_run = %previous.run_id,
            source = %source,
            batch_no = checkpoint.batch_no,
            offset = checkpoint.offset,
            "Resuming from checkpoint"
        );

        Ok(Self {
            source,
            from_run: Some(previous.run_id),
            pointer: Some(ResumePointer {
                source,
                batch_no: checkpoint.batch_no,
                offset: checkpoint.offset,
            }),
        })
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn from_run(&self) -> Option<&RunId> {
        self.from_run.as_ref()
    }

    pub fn pointer(&self) -> Option<&ResumePointer> {
        self.pointer.as_ref()
    }

    /// Offset to start reading at
    pub fn offset(&self) -> u64 {
        self.pointer.as_ref().map(|p| p.offset).unwrap_or(0)
    }

    pub fn request(&self) -> ExtractRequest {
        ExtractRequest {
            offset: self.offset(),
        }
    }

    /// Checkpoint offsets for a load that consumed the source up to `end_offset`
    pub fn checkpoint_plan(&self, end_offset: u64) -> CheckpointPlan {
        CheckpointPlan {
            source: self.source,
            start_offset: self.offset(),
            end_offset: end_offset.max(self.offset()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::InMemoryStore;
    use crate::domain::{Checkpoint, Run, RunStatus};

    #[tokio::test]
    async fn test_fresh_when_no_previous_run() {
        let store = InMemoryStore::new();
        let current = RunId::new("run_now").unwrap();
        let cursor = ResumeCursor::discover(&store, &current, SourceKind::Csv)
            .await
            .unwrap();
        assert_eq!(cursor.offset(), 0);
        assert!(cursor.pointer().is_none());
        assert!(cursor.from_run().is_none());
    }

    #[tokio::test]
    async fn test_resumes_from_failed_run_checkpoint() {
        let store = InMemoryStore::new();
        let mut failed = Run::start_with_id(RunId::new("run_failed").unwrap());
        failed.finish(RunStatus::Failed);
        store.create_run(&failed).await.unwrap();
        for (batch_no, offset) in [(1, 0), (2, 120)] {
            store
                .create_checkpoint(&Checkpoint::completed(
                    failed.run_id.clone(),
                    SourceKind::Csv,
                    batch_no,
                    offset,
                ))
                .await
                .unwrap();
        }

        let current = Run::start_with_id(RunId::new("run_now").unwrap());
        store.create_run(&current).await.unwrap();

        let cursor = ResumeCursor::discover(&store, &current.run_id, SourceKind::Csv)
            .await
            .unwrap();
        assert_eq!(cursor.offset(), 120);
        assert_eq!(cursor.request().offset, 120);
        assert_eq!(
            cursor.pointer(),
            Some(&ResumePointer {
                source: SourceKind::Csv,
                batch_no: 2,
                offset: 120,
            })
        );
    }

    #[tokio::test]
    async fn test_completed_runs_are_not_resumed() {
        let store = InMemoryStore::new();
        let mut done = Run::start_with_id(RunId::new("run_done").unwrap());
        done.finish(RunStatus::Completed);
        store.create_run(&done).await.unwrap();
        store
            .create_checkpoint(&Checkpoint::completed(done.run_id.clone(), SourceKind::Csv, 1, 50))
            .await
            .unwrap();

        let cursor = ResumeCursor::discover(&store, &RunId::new("run_now").unwrap(), SourceKind::Csv)
            .await
            .unwrap();
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn test_checkpoint_plan_never_moves_backwards() {
        let cursor = ResumeCursor {
            source: SourceKind::Csv,
            from_run: None,
            pointer: Some(ResumePointer {
                source: SourceKind::Csv,
                batch_no: 1,
                offset: 30,
            }),
        };
        let plan = cursor.checkpoint_plan(10);
        assert_eq!(plan.start_offset, 30);
        assert_eq!(plan.end_offset, 30);
    }
}
