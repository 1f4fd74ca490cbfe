//! Engine façade: configuration, source bindings, run gate and entry points.

use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::validation::{check_endpoint, validate_engine_config};
use crate::config::{EngineConfig, ValidationError};
use crate::event::{validate_filters, EventDecoder, EventFilter, JsonEventDecoder};
use crate::ingest::arbiter::ModeArbiter;
use crate::ingest::control::{RunGate, RunState, StopSignal};
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::handler::EventHandler;
use crate::ingest::historical::HistoricalIngestor;
use crate::ingest::query_health;
use crate::ingest::sink::{EventSink, FeedMode};
use crate::ingest::types::{ArchiveRange, Exit, IngestionRange, RunSummary};
use crate::observability::metrics;
use crate::source::{LedgerSource, RpcClient, SourceHealth};

/// Streams contract events from a live source, backfilling from an
/// optional archive source, into a caller-supplied handler.
///
/// One run at a time per instance; `stop()` may be called from any task.
pub struct EventIngestor {
    config: EngineConfig,
    live: Arc<dyn LedgerSource>,
    archive: OnceLock<Arc<dyn LedgerSource>>,
    decoder: Arc<dyn EventDecoder>,
    filters: ArcSwap<Vec<EventFilter>>,
    gate: RunGate,
    stop: StopSignal,
}

impl EventIngestor {
    /// Build an engine talking JSON-RPC to the configured endpoints.
    pub fn new(config: EngineConfig) -> IngestResult<Self> {
        validate_engine_config(&config).map_err(IngestError::InvalidConfig)?;
        let live = RpcClient::new(&config.live_url, config.rpc_timeout_secs)
            .map_err(|e| invalid("live_url", e))?;
        Self::build(config, Arc::new(live))
    }

    /// Build an engine around an already constructed live source.
    ///
    /// `config.live_url` is still validated but not dialled.
    pub fn with_live_source(config: EngineConfig, live: Arc<dyn LedgerSource>) -> IngestResult<Self> {
        validate_engine_config(&config).map_err(IngestError::InvalidConfig)?;
        Self::build(config, live)
    }

    fn build(config: EngineConfig, live: Arc<dyn LedgerSource>) -> IngestResult<Self> {
        let archive = OnceLock::new();
        if let Some(url) = &config.archive_url {
            let client = RpcClient::new(url, config.rpc_timeout_secs)
                .map_err(|e| invalid("archive_url", e))?;
            let _ = archive.set(Arc::new(client) as Arc<dyn LedgerSource>);
        }

        tracing::debug!(
            live = %live.endpoint(),
            archive = ?config.archive_url,
            filters = config.filters.len(),
            "Event ingestor created"
        );

        Ok(Self {
            filters: ArcSwap::from_pointee(config.filters.clone()),
            config,
            live,
            archive,
            decoder: Arc::new(JsonEventDecoder),
            gate: RunGate::new(),
            stop: StopSignal::new(),
        })
    }

    /// Replace the event decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn EventDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the active filter set.
    pub fn filters(&self) -> Vec<EventFilter> {
        self.filters.load().as_ref().clone()
    }

    /// Replace the filter set. A running live loop picks it up on its
    /// next poll.
    pub fn set_filters(&self, filters: Vec<EventFilter>) -> IngestResult<()> {
        validate_filters(&filters).map_err(|e| invalid("filters", e))?;
        self.filters.store(Arc::new(filters));
        Ok(())
    }

    /// Remove all filters, so every event matches.
    pub fn clear_filters(&self) {
        self.filters.store(Arc::new(Vec::new()));
    }

    /// Bind the archive source by endpoint. Only one binding is allowed.
    pub fn set_archive_source(&self, endpoint: &str) -> IngestResult<()> {
        self.ensure_archive_unbound()?;
        check_endpoint(endpoint).map_err(|e| invalid("archive_url", e))?;
        let client = RpcClient::new(endpoint, self.config.rpc_timeout_secs)
            .map_err(|e| invalid("archive_url", e))?;
        self.bind_archive_source(Arc::new(client))
    }

    /// Bind an already constructed archive source. Only one binding is allowed.
    pub fn bind_archive_source(&self, source: Arc<dyn LedgerSource>) -> IngestResult<()> {
        let endpoint = source.endpoint().to_string();
        self.archive
            .set(source)
            .map_err(|_| self.already_bound())?;
        tracing::info!(endpoint = %endpoint, "Archive source bound");
        Ok(())
    }

    pub fn has_archive_source(&self) -> bool {
        self.archive.get().is_some()
    }

    pub fn run_state(&self) -> RunState {
        self.gate.state()
    }

    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    /// Ask the in-flight run to stop at its next checkpoint. A no-op when
    /// idle or while a run is still clearing its previous stop request.
    pub fn stop(&self) {
        if self.is_running() {
            tracing::info!("Stop requested");
            self.stop.trigger();
        }
    }

    /// Health of the live source.
    pub async fn health(&self) -> IngestResult<SourceHealth> {
        self.live
            .get_health()
            .await
            .map_err(|e| IngestError::source_failed(self.live.endpoint(), e))
    }

    /// Health of the archive source.
    pub async fn archive_health(&self) -> IngestResult<SourceHealth> {
        let archive = self.archive.get().ok_or(IngestError::ArchiveNotBound)?;
        archive
            .get_health()
            .await
            .map_err(|e| IngestError::source_failed(archive.endpoint(), e))
    }

    /// Ingest from the live source only.
    ///
    /// Fails with `NotRetained` if the start ledger has left the live
    /// retention window.
    pub async fn start_live<H: EventHandler>(
        &self,
        handler: H,
        range: IngestionRange,
    ) -> IngestResult<RunSummary> {
        let guard = self.gate.try_enter().ok_or(IngestError::AlreadyRunning)?;
        range.check()?;
        self.stop.reset();
        guard.activate();

        let run_id = Uuid::new_v4();
        let mut sink = EventSink::new(handler, self.decoder.as_ref(), self.config.dedup_capacity);
        let span = tracing::info_span!("ingest_run", %run_id, mode = "live");
        let result = ModeArbiter::new(self.live.as_ref(), None, &self.config, &self.filters, &self.stop)
            .run(&mut sink, range)
            .instrument(span.clone())
            .await;
        span.in_scope(|| finish("live", run_id, result, sink.delivered()))
    }

    /// Ingest `[start_ledger, stop_ledger]` from the archive source only.
    pub async fn start_archive<H: EventHandler>(
        &self,
        handler: H,
        range: ArchiveRange,
    ) -> IngestResult<RunSummary> {
        let guard = self.gate.try_enter().ok_or(IngestError::AlreadyRunning)?;
        range.check()?;
        let archive = self.archive.get().ok_or(IngestError::ArchiveNotBound)?;
        self.stop.reset();
        guard.activate();

        let run_id = Uuid::new_v4();
        let mut sink = EventSink::new(handler, self.decoder.as_ref(), self.config.dedup_capacity);
        sink.set_mode(FeedMode::Backfill);
        let span = tracing::info_span!("ingest_run", %run_id, mode = "archive");
        let result = self
            .run_archive(archive.as_ref(), &mut sink, range)
            .instrument(span.clone())
            .await;
        span.in_scope(|| finish("archive", run_id, result, sink.delivered()))
    }

    /// Ingest across both sources: backfill from the archive while the
    /// start is older than the live retention window, then follow live.
    pub async fn start<H: EventHandler>(
        &self,
        handler: H,
        range: IngestionRange,
    ) -> IngestResult<RunSummary> {
        let guard = self.gate.try_enter().ok_or(IngestError::AlreadyRunning)?;
        range.check()?;
        self.stop.reset();
        guard.activate();

        let run_id = Uuid::new_v4();
        let mut sink = EventSink::new(handler, self.decoder.as_ref(), self.config.dedup_capacity);
        let archive = self.archive.get().map(|a| a.as_ref());
        let span = tracing::info_span!("ingest_run", %run_id, mode = "combined");
        let result = ModeArbiter::new(self.live.as_ref(), archive, &self.config, &self.filters, &self.stop)
            .run(&mut sink, range)
            .instrument(span.clone())
            .await;
        span.in_scope(|| finish("combined", run_id, result, sink.delivered()))
    }

    async fn run_archive<H: EventHandler>(
        &self,
        archive: &dyn LedgerSource,
        sink: &mut EventSink<'_, H>,
        range: ArchiveRange,
    ) -> IngestResult<Exit> {
        let health = query_health(archive).await?;
        if range.start_ledger > health.latest_ledger {
            return Err(IngestError::AheadOfTip {
                start_ledger: range.start_ledger,
                latest_ledger: health.latest_ledger,
            });
        }
        HistoricalIngestor::new(archive, &self.config, &self.filters, &self.stop)
            .run(sink, range.start_ledger, range.stop_ledger)
            .await
    }

    fn ensure_archive_unbound(&self) -> IngestResult<()> {
        if self.archive.get().is_some() {
            return Err(self.already_bound());
        }
        Ok(())
    }

    fn already_bound(&self) -> IngestError {
        IngestError::ArchiveAlreadyBound {
            endpoint: self
                .archive
                .get()
                .map(|a| a.endpoint().to_string())
                .unwrap_or_default(),
        }
    }
}

fn invalid(field: &'static str, message: impl ToString) -> IngestError {
    IngestError::InvalidConfig(vec![ValidationError::new(field, message.to_string())])
}

fn finish(
    mode: &'static str,
    run_id: Uuid,
    result: IngestResult<Exit>,
    events_delivered: u64,
) -> IngestResult<RunSummary> {
    match result {
        Ok(exit) => {
            metrics::record_run(mode, exit.outcome.as_str());
            tracing::info!(
                outcome = exit.outcome.as_str(),
                events_delivered,
                resume_ledger = exit.resume_ledger,
                "Ingestion run finished"
            );
            Ok(RunSummary {
                run_id,
                outcome: exit.outcome,
                events_delivered,
                resume_ledger: exit.resume_ledger,
            })
        }
        Err(e) => {
            metrics::record_run(mode, "error");
            tracing::error!(error = %e, kind = ?e.kind(), events_delivered, "Ingestion run failed");
            Err(e)
        }
    }
}
