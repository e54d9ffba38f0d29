//! Run orchestrator - owns the lifecycle of one ETL run
//!
//! A run moves `started -> completed | completed_with_warnings | failed`.
//! Extraction fans out across every source concurrently; reconciliation,
//! normalization and loading follow once all sources have answered. The load
//! sits in its own failure boundary, and anything unexpected is caught at the
//! outermost one, so a run always reaches a terminal status.

use crate::adapters::database::{create_store, MarketStore};
use crate::adapters::sources::{build_adapters, ExtractRequest, Extraction, SourceAdapter};
use crate::config::MarketflowConfig;
use crate::core::load::{LoadReport, Loader};
use crate::core::metrics::{ErrorKind, EtlMetrics};
use crate::core::ratelimit::RateLimiterRegistry;
use crate::core::run::cursor::ResumeCursor;
use crate::core::schema::{apply_mapping, record_schema_version, Reconciliation, SchemaReconciler};
use crate::core::transform::{Normalizer, SourceBatch};
use crate::domain::{
    MarketflowError, QuarantineReason, QuarantinedRecord, RawRecord, Result, Run, RunId,
    RunStatus, SourceKind,
};
use crate::{log_run_complete, log_run_start};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// What went wrong (or was tolerated) during a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunOutcome {
    source_failed: bool,
    load_failed: bool,
    unexpected: bool,
    warnings: bool,
}

impl RunOutcome {
    fn status(&self, continue_on_source_failure: bool) -> RunStatus {
        if self.unexpected || self.load_failed {
            return RunStatus::Failed;
        }
        if self.source_failed {
            return if continue_on_source_failure {
                RunStatus::CompletedWithWarnings
            } else {
                RunStatus::Failed
            };
        }
        if self.warnings {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Completed
        }
    }
}

/// Exclusive right to execute one run; released on drop
#[derive(Debug)]
pub struct RunPermit {
    _guard: OwnedMutexGuard<()>,
}

/// Runs the extract-transform-load pipeline
///
/// At most one run executes per orchestrator; a concurrent request is
/// rejected with [`MarketflowError::RunInProgress`].
pub struct RunOrchestrator {
    store: Arc<dyn MarketStore + Send + Sync>,
    limiter: Arc<RateLimiterRegistry>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    reconciler: SchemaReconciler,
    normalizer: Normalizer,
    loader: Loader,
    metrics: Arc<EtlMetrics>,
    continue_on_source_failure: bool,
    gate: Arc<Mutex<()>>,
}

impl RunOrchestrator {
    /// Builds an orchestrator with the store and adapters described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or an adapter cannot
    /// be built.
    pub async fn from_config(config: &MarketflowConfig) -> Result<Self> {
        let store = create_store(config).await?;
        Self::with_store(config, store)
    }

    /// Builds an orchestrator on top of an existing store
    ///
    /// # Errors
    ///
    /// Returns an error if an adapter cannot be built.
    pub fn with_store(
        config: &MarketflowConfig,
        store: Arc<dyn MarketStore + Send + Sync>,
    ) -> Result<Self> {
        let limiter = Arc::new(RateLimiterRegistry::from_config(&config.rate_limit));
        let adapters = build_adapters(config, limiter.clone())?;
        Ok(Self::new(config, store, limiter, adapters))
    }

    pub fn new(
        config: &MarketflowConfig,
        store: Arc<dyn MarketStore + Send + Sync>,
        limiter: Arc<RateLimiterRegistry>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        Self {
            loader: Loader::new(store.clone(), &config.load),
            store,
            limiter,
            adapters,
            reconciler: SchemaReconciler::from_config(&config.schema),
            normalizer: Normalizer::from_config(&config.transform),
            metrics: Arc::new(EtlMetrics::new()),
            continue_on_source_failure: config.run.continue_on_source_failure,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> Arc<dyn MarketStore + Send + Sync> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<EtlMetrics> {
        self.metrics.clone()
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|a| a.source()).collect()
    }

    /// Whether a run is executing right now
    pub fn is_running(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Takes the run gate without waiting
    ///
    /// # Errors
    ///
    /// Returns [`MarketflowError::RunInProgress`] when a run holds the gate.
    pub fn try_reserve(&self) -> Result<RunPermit> {
        self.gate
            .clone()
            .try_lock_owned()
            .map(|guard| RunPermit { _guard: guard })
            .map_err(|_| {
                MarketflowError::RunInProgress(
                    "another run is executing in this process".to_string(),
                )
            })
    }

    /// Executes one run to a terminal status
    ///
    /// Source, drift, validation and load failures are recorded on the
    /// returned run rather than returned as errors.
    ///
    /// # Errors
    ///
    /// Returns [`MarketflowError::RunInProgress`] when another run holds the
    /// gate (no run is created), or a store error when the run row itself
    /// cannot be created.
    pub async fn execute_run(&self) -> Result<Run> {
        let permit = self.try_reserve()?;
        self.execute_reserved(permit).await
    }

    /// Executes one run under a permit from [`RunOrchestrator::try_reserve`]
    ///
    /// # Errors
    ///
    /// Returns a store error when the run row cannot be created.
    pub async fn execute_reserved(&self, _permit: RunPermit) -> Result<Run> {
        let started = Instant::now();
        let mut run = Run::start();
        self.store.create_run(&run).await?;
        log_run_start!(run.run_id, self.adapters.len());

        let throttle_baseline = self.limiter.throttle_snapshot();
        let mut outcome = RunOutcome::default();

        if let Err(e) = self.run_stages(&mut run, &mut outcome).await {
            outcome.unexpected = true;
            self.record_error(&mut run, ErrorKind::Unexpected, "Unexpected error", e.to_string());
        }

        self.record_throttling(&mut run, &throttle_baseline);
        run.finish(outcome.status(self.continue_on_source_failure));

        if let Err(e) = self.store.save_run(&run).await {
            tracing::error!(
                run_id = %run.run_id,
                status = %run.status,
                error = %e,
                "Failed to persist final run state"
            );
        }

        self.metrics
            .observe_run(started.elapsed().as_millis().min(u64::MAX as u128) as u64);
        log_run_complete!(run);

        Ok(run)
    }

    async fn run_stages(&self, run: &mut Run, outcome: &mut RunOutcome) -> Result<()> {
        let cursor = self.discover_cursor(&run.run_id).await?;
        if let Some(pointer) = cursor.as_ref().and_then(ResumeCursor::pointer) {
            run.resume_from = Some(pointer.clone());
            self.store.save_run(run).await?;
        }

        // Extract
        let mut extracted = Vec::with_capacity(self.adapters.len());
        let mut quarantine = Vec::new();
        for (source, result) in self.extract_all(cursor.as_ref()).await {
            match result {
                Ok(mut extraction) => {
                    run.stats.extracted += extraction.items.len() + extraction.malformed.len();
                    for item in std::mem::take(&mut extraction.malformed) {
                        self.metrics.record_error(ErrorKind::Validation);
                        quarantine.push(
                            QuarantinedRecord::new(
                                run.run_id.clone(),
                                source,
                                QuarantineReason::ValidationError,
                                item.payload,
                            )
                            .with_detail(item.reason),
                        );
                    }
                    if extraction.from_cache {
                        outcome.warnings = true;
                        self.record_error(
                            run,
                            ErrorKind::Source,
                            format!("Source {source} served from cache"),
                            extraction.fallback_reason.clone().unwrap_or_default(),
                        );
                    }
                    extracted.push(extraction);
                }
                Err(e) => {
                    outcome.source_failed = true;
                    self.record_error(
                        run,
                        ErrorKind::Source,
                        format!("Source {source} failed"),
                        e.to_string(),
                    );
                }
            }
        }
        self.metrics.add_rows_processed(run.stats.extracted as u64);

        if outcome.source_failed && !self.continue_on_source_failure {
            tracing::error!(run_id = %run.run_id, "Source failure, skipping transform and load");
            return Ok(());
        }

        let raw: Vec<RawRecord> = extracted
            .iter()
            .flat_map(|extraction| {
                extraction
                    .items
                    .iter()
                    .map(|item| RawRecord::new(run.run_id.clone(), extraction.source, item.clone()))
            })
            .collect();

        // Reconcile
        for extraction in extracted.iter_mut() {
            self.reconcile(run, outcome, extraction, &mut quarantine)
                .await;
        }

        // Transform
        let batches: Vec<SourceBatch<'_>> = extracted
            .iter()
            .map(|extraction| SourceBatch {
                source: extraction.source,
                items: &extraction.items,
            })
            .collect();
        let output = self.normalizer.transform(&batches, Utc::now());

        for rejected in output.rejected {
            self.metrics.record_error(ErrorKind::Validation);
            quarantine.push(
                QuarantinedRecord::new(
                    run.run_id.clone(),
                    rejected.source,
                    QuarantineReason::ValidationError,
                    rejected.payload,
                )
                .with_detail(rejected.reason),
            );
        }
        self.quarantine(run, outcome, &quarantine).await;

        // Load
        let checkpoint = cursor.as_ref().and_then(|cursor| {
            extracted
                .iter()
                .find(|extraction| extraction.source == cursor.source())
                .map(|extraction| cursor.checkpoint_plan(extraction.next_offset))
        });

        let mut report = LoadReport::default();
        let loaded = self
            .loader
            .load(&run.run_id, output.records, &raw, checkpoint, &mut report)
            .await;

        run.stats.loaded += report.loaded();
        run.stats.duplicates += report.duplicates();

        if let Err(e) = loaded {
            outcome.load_failed = true;
            self.record_error(run, ErrorKind::Load, "Load failed", e.to_string());
        }

        Ok(())
    }

    async fn discover_cursor(&self, run_id: &RunId) -> Result<Option<ResumeCursor>> {
        let Some(source) = self
            .adapters
            .iter()
            .map(|adapter| adapter.source())
            .find(SourceKind::is_resumable)
        else {
            return Ok(None);
        };

        ResumeCursor::discover(self.store.as_ref(), run_id, source)
            .await
            .map(Some)
    }

    async fn extract_all(
        &self,
        cursor: Option<&ResumeCursor>,
    ) -> Vec<(SourceKind, Result<Extraction>)> {
        let extractions = self.adapters.iter().map(|adapter| {
            let request = match cursor {
                Some(cursor) if cursor.source() == adapter.source() => cursor.request(),
                _ => ExtractRequest::default(),
            };
            let adapter = Arc::clone(adapter);
            async move {
                let source = adapter.source();
                let result = adapter.extract(&request).await;
                if let Ok(extraction) = &result {
                    tracing::info!(
                        source = %source,
                        items = extraction.items.len(),
                        offset = extraction.start_offset,
                        from_cache = extraction.from_cache,
                        "Source extracted"
                    );
                }
                (source, result)
            }
        });

        join_all(extractions).await
    }

    /// Applies the schema policy to a tabular extraction
    ///
    /// A dropped batch moves every row to `quarantine` and leaves the
    /// extraction empty.
    async fn reconcile(
        &self,
        run: &mut Run,
        outcome: &mut RunOutcome,
        extraction: &mut Extraction,
        quarantine: &mut Vec<QuarantinedRecord>,
    ) {
        let Some(headers) = extraction.headers.clone() else {
            return;
        };
        if extraction.items.is_empty() {
            return;
        }
        let source = extraction.source;

        match self.reconciler.assess(&headers) {
            Reconciliation::Exact { confidence } => {
                tracing::debug!(source = %source, confidence, "Headers match canonical schema");
            }
            Reconciliation::Mapped {
                confidence,
                mappings,
            } => {
                tracing::info!(
                    source = %source,
                    confidence,
                    mappings = ?mappings,
                    "Schema drift reconciled"
                );
                if let Err(e) = record_schema_version(
                    self.store.as_ref(),
                    source,
                    &headers,
                    &mappings,
                    confidence,
                )
                .await
                {
                    outcome.warnings = true;
                    self.record_error(
                        run,
                        ErrorKind::SchemaDrift,
                        format!("Schema version write failed for {source}"),
                        e.to_string(),
                    );
                }
                apply_mapping(&mut extraction.items, &mappings);
            }
            Reconciliation::Dropped { confidence } => {
                outcome.warnings = true;
                let dropped = std::mem::take(&mut extraction.items);
                let rows = dropped.len();
                quarantine.extend(dropped.into_iter().map(|payload| {
                    QuarantinedRecord::new(
                        run.run_id.clone(),
                        source,
                        QuarantineReason::LowConfidenceSchema,
                        payload,
                    )
                    .with_confidence(confidence)
                }));
                self.record_error(
                    run,
                    ErrorKind::SchemaDrift,
                    format!("Schema drift on {source}, batch dropped"),
                    format!("header confidence {confidence:.3} below drop threshold; {rows} row(s) quarantined"),
                );
            }
        }
    }

    async fn quarantine(
        &self,
        run: &mut Run,
        outcome: &mut RunOutcome,
        records: &[QuarantinedRecord],
    ) {
        if records.is_empty() {
            return;
        }
        outcome.warnings = true;
        run.stats.quarantined += records.len();

        match self.store.insert_quarantined(records).await {
            Ok(written) => {
                tracing::warn!(run_id = %run.run_id, written, "Records quarantined");
            }
            Err(e) => {
                self.record_error(
                    run,
                    ErrorKind::Quarantine,
                    "Quarantine write failed",
                    e.to_string(),
                );
            }
        }
    }

    fn record_throttling(&self, run: &mut Run, baseline: &HashMap<String, u64>) {
        for (source, total) in self.limiter.throttle_snapshot() {
            let during_run = total.saturating_sub(baseline.get(&source).copied().unwrap_or(0));
            run.stats.throttle_events += during_run as usize;
            self.metrics.add_throttle_events(&source, during_run);
        }
    }

    fn record_error(
        &self,
        run: &mut Run,
        kind: ErrorKind,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) {
        let message = message.into();
        let detail = detail.into();
        match kind {
            ErrorKind::Load | ErrorKind::Unexpected | ErrorKind::Source => tracing::error!(
                run_id = %run.run_id,
                kind = kind.as_str(),
                detail = %detail,
                "{message}"
            ),
            _ => tracing::warn!(
                run_id = %run.run_id,
                kind = kind.as_str(),
                detail = %detail,
                "{message}"
            ),
        }
        self.metrics.record_error(kind);
        run.add_error(message, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::InMemoryStore;
    use crate::domain::SourceError;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StaticAdapter {
        source: SourceKind,
        extraction: Option<Extraction>,
    }

    impl StaticAdapter {
        fn ok(extraction: Extraction) -> Arc<dyn SourceAdapter> {
            Arc::new(Self {
                source: extraction.source,
                extraction: Some(extraction),
            })
        }

        fn failing(source: SourceKind) -> Arc<dyn SourceAdapter> {
            Arc::new(Self {
                source,
                extraction: None,
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for StaticAdapter {
        fn source(&self) -> SourceKind {
            self.source
        }

        async fn extract(&self, _request: &ExtractRequest) -> Result<Extraction> {
            self.extraction.clone().ok_or_else(|| {
                SourceError::Exhausted {
                    source_name: self.source.to_string(),
                    attempts: 3,
                    last_error: "HTTP 503".to_string(),
                }
                .into()
            })
        }
    }

    fn assets(items: Vec<Value>) -> Extraction {
        Extraction::snapshot(SourceKind::AssetsApi, items)
    }

    fn tickers(items: Vec<Value>) -> Extraction {
        Extraction::snapshot(SourceKind::TickersApi, items)
    }

    fn orchestrator(
        config: &MarketflowConfig,
        store: Arc<InMemoryStore>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> RunOrchestrator {
        let limiter = Arc::new(RateLimiterRegistry::from_config(&config.rate_limit));
        RunOrchestrator::new(config, store, limiter, adapters)
    }

    #[test]
    fn test_outcome_status_rules() {
        let clean = RunOutcome::default();
        assert_eq!(clean.status(false), RunStatus::Completed);

        let warned = RunOutcome {
            warnings: true,
            ..Default::default()
        };
        assert_eq!(warned.status(false), RunStatus::CompletedWithWarnings);

        let source_failed = RunOutcome {
            source_failed: true,
            ..Default::default()
        };
        assert_eq!(source_failed.status(false), RunStatus::Failed);
        assert_eq!(source_failed.status(true), RunStatus::CompletedWithWarnings);

        let load_failed = RunOutcome {
            load_failed: true,
            ..Default::default()
        };
        assert_eq!(load_failed.status(true), RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_loads_every_source() {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = orchestrator(
            &MarketflowConfig::default(),
            store.clone(),
            vec![
                StaticAdapter::ok(assets(vec![
                    json!({"symbol": "BTC", "priceUsd": "68000", "timestamp": 1_728_561_600_000_i64}),
                    json!({"symbol": "ETH", "priceUsd": "2400", "timestamp": 1_728_561_600_000_i64}),
                ])),
                StaticAdapter::ok(tickers(vec![
                    json!({"pair": "SOL-USD", "last": 150.0, "time": "2024-10-10T12:00:00Z"}),
                ])),
            ],
        );

        let run = orchestrator.execute_run().await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.stats.extracted, 3);
        assert_eq!(run.stats.loaded, 3);
        assert!(run.end_time.is_some());
        assert_eq!(store.count_records().await.unwrap(), 3);
        assert_eq!(store.raw_count(), 3);

        let stored = store.get_run(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Completed);

        let snapshot = orchestrator.metrics().snapshot();
        assert_eq!(snapshot.runs_total, 1);
        assert_eq!(snapshot.rows_processed_total, 3);
    }

    #[tokio::test]
    async fn test_fatal_source_failure_skips_load() {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = orchestrator(
            &MarketflowConfig::default(),
            store.clone(),
            vec![
                StaticAdapter::ok(assets(vec![
                    json!({"symbol": "BTC", "priceUsd": "68000"}),
                ])),
                StaticAdapter::failing(SourceKind::TickersApi),
            ],
        );

        let run = orchestrator.execute_run().await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.stats.extracted, 1);
        assert_eq!(run.stats.loaded, 0);
        assert_eq!(run.errors[0].message, "Source tickers_api failed");
        assert_eq!(store.count_records().await.unwrap(), 0);
        assert_eq!(
            orchestrator.metrics().snapshot().errors_total.get("source"),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn test_continue_on_source_failure_loads_survivors() {
        let mut config = MarketflowConfig::default();
        config.run.continue_on_source_failure = true;
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = orchestrator(
            &config,
            store.clone(),
            vec![
                StaticAdapter::ok(assets(vec![
                    json!({"symbol": "BTC", "priceUsd": "68000"}),
                ])),
                StaticAdapter::failing(SourceKind::TickersApi),
            ],
        );

        let run = orchestrator.execute_run().await.unwrap();

        assert_eq!(run.status, RunStatus::CompletedWithWarnings);
        assert_eq!(run.stats.loaded, 1);
    }

    #[tokio::test]
    async fn test_cached_source_completes_with_warnings() {
        let store = Arc::new(InMemoryStore::new());
        let mut cached = assets(vec![json!({"symbol": "BTC", "priceUsd": "68000"})]);
        cached.from_cache = true;
        cached.fallback_reason = Some("HTTP 503".to_string());
        let orchestrator = orchestrator(
            &MarketflowConfig::default(),
            store,
            vec![StaticAdapter::ok(cached)],
        );

        let run = orchestrator.execute_run().await.unwrap();

        assert_eq!(run.status, RunStatus::CompletedWithWarnings);
        assert_eq!(run.stats.loaded, 1);
        assert_eq!(run.errors[0].detail, "HTTP 503");
    }

    #[tokio::test]
    async fn test_invalid_records_are_quarantined() {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = orchestrator(
            &MarketflowConfig::default(),
            store.clone(),
            vec![StaticAdapter::ok(tickers(vec![
                json!({"pair": "BTC-USD", "last": "68000"}),
                json!({"pair": "ETH-USD", "last": "n/a"}),
            ]))],
        );

        let run = orchestrator.execute_run().await.unwrap();

        assert_eq!(run.status, RunStatus::CompletedWithWarnings);
        assert_eq!(run.stats.loaded, 1);
        assert_eq!(run.stats.quarantined, 1);
        let quarantined = store.quarantined_for_run(&run.run_id).await.unwrap();
        assert_eq!(quarantined.len(), 1);
        assert_eq!(quarantined[0].reason, QuarantineReason::ValidationError);
        assert_eq!(quarantined[0].detail.as_deref(), Some("missing price"));
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_while_gate_held() {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = orchestrator(
            &MarketflowConfig::default(),
            store.clone(),
            vec![StaticAdapter::ok(assets(Vec::new()))],
        );

        let held = orchestrator.try_reserve().unwrap();
        assert!(orchestrator.is_running());
        let err = orchestrator.execute_run().await.unwrap_err();
        assert!(matches!(err, MarketflowError::RunInProgress(_)));
        assert!(store.list_runs(10).await.unwrap().is_empty());

        drop(held);
        assert!(!orchestrator.is_running());
        let run = orchestrator.execute_run().await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_throttle_events_are_counted_per_run() {
        let config = MarketflowConfig::default();
        let store = Arc::new(InMemoryStore::new());
        let limiter = Arc::new(RateLimiterRegistry::new(
            crate::config::BucketConfig {
                capacity: 1,
                tokens_per_interval: 1,
                interval_ms: 20,
            },
            std::time::Duration::from_millis(5),
        ));
        assert!(limiter.try_take("assets_api"));
        let failed = limiter.acquire("assets_api").await;
        assert!(failed >= 1);

        let orchestrator = RunOrchestrator::new(
            &config,
            store,
            limiter.clone(),
            vec![StaticAdapter::ok(assets(Vec::new()))],
        );

        // Throttling before the run started is not attributed to it
        let run = orchestrator.execute_run().await.unwrap();
        assert_eq!(run.stats.throttle_events, 0);

        let mut run = Run::start();
        orchestrator.record_throttling(&mut run, &HashMap::new());
        assert_eq!(run.stats.throttle_events as u64, failed);
        assert_eq!(
            orchestrator
                .metrics()
                .snapshot()
                .throttle_events_total
                .get("assets_api"),
            Some(&failed)
        );
    }
}
