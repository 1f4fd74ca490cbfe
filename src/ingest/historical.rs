//! Backfill from the archive source.
//!
//! Ledgers are fetched in batches, strictly in sequence. A batch that skips
//! a sequence or makes no progress is an archive gap: backfill never jumps
//! over a ledger it could not read.

use arc_swap::ArcSwap;

use crate::config::EngineConfig;
use crate::event::EventFilter;
use crate::ingest::control::StopSignal;
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::handler::EventHandler;
use crate::ingest::sink::EventSink;
use crate::ingest::types::Exit;
use crate::observability::metrics;
use crate::source::{LedgerSource, LedgersRequest, RawLedger};

/// Result of processing one archive batch.
enum Batch {
    /// Next ledger to fetch.
    Advanced(u32),
    /// Delivered the last representable ledger.
    Exhausted,
    Stopped(u32),
}

pub(crate) struct HistoricalIngestor<'a> {
    source: &'a dyn LedgerSource,
    config: &'a EngineConfig,
    filters: &'a ArcSwap<Vec<EventFilter>>,
    stop: &'a StopSignal,
}

impl<'a> HistoricalIngestor<'a> {
    pub(crate) fn new(
        source: &'a dyn LedgerSource,
        config: &'a EngineConfig,
        filters: &'a ArcSwap<Vec<EventFilter>>,
        stop: &'a StopSignal,
    ) -> Self {
        Self {
            source,
            config,
            filters,
            stop,
        }
    }

    /// Deliver every matching event in `[start_ledger, target_ledger]`.
    pub(crate) async fn run<H: EventHandler>(
        &self,
        sink: &mut EventSink<'_, H>,
        start_ledger: u32,
        target_ledger: u32,
    ) -> IngestResult<Exit> {
        tracing::info!(
            endpoint = %self.source.endpoint(),
            start_ledger,
            target_ledger,
            "Backfill started"
        );

        let mut next = start_ledger;
        while next <= target_ledger {
            if self.stop.is_triggered() {
                return Ok(Exit::stopped(next));
            }

            match self.batch(sink, next, target_ledger).await? {
                Batch::Advanced(ledger) => next = ledger,
                Batch::Exhausted => break,
                Batch::Stopped(ledger) => return Ok(Exit::stopped(ledger)),
            }
            metrics::set_cursor_ledger("backfill", next);

            if next <= target_ledger && self.stop.sleep(self.config.archival_interval()).await {
                return Ok(Exit::stopped(next));
            }
        }

        tracing::info!(start_ledger, target_ledger, "Backfill completed");
        Ok(Exit::completed(target_ledger.saturating_add(1)))
    }

    async fn batch<H: EventHandler>(
        &self,
        sink: &mut EventSink<'_, H>,
        next: u32,
        target_ledger: u32,
    ) -> IngestResult<Batch> {
        let remaining = (target_ledger - next).saturating_add(1);
        let request = LedgersRequest {
            start_ledger: next,
            limit: self.config.page_size.min(remaining),
        };

        let page = self
            .source
            .get_ledgers(&request)
            .await
            .map_err(|e| IngestError::source_failed(self.source.endpoint(), e))?;
        metrics::record_page("backfill");

        tracing::debug!(
            start_ledger = next,
            ledgers = page.ledgers.len(),
            archive_latest = page.latest_ledger,
            "Fetched ledger batch"
        );

        let filters = self.filters.load_full();
        let mut expected = next;
        for ledger in &page.ledgers {
            if ledger.sequence < expected {
                continue;
            }
            if ledger.sequence > target_ledger {
                break;
            }
            if ledger.sequence != expected {
                return Err(IngestError::ArchiveGap {
                    ledger: expected,
                    archive_latest: page.latest_ledger,
                });
            }

            if !self.deliver_ledger(sink, ledger, &filters).await? {
                return Ok(Batch::Stopped(expected));
            }
            match expected.checked_add(1) {
                Some(following) => expected = following,
                None => {
                    metrics::record_backfill_ledgers(expected - next + 1);
                    return Ok(Batch::Exhausted);
                }
            }
        }

        if expected == next {
            return Err(IngestError::ArchiveGap {
                ledger: next,
                archive_latest: page.latest_ledger,
            });
        }

        metrics::record_backfill_ledgers(expected - next);
        Ok(Batch::Advanced(expected))
    }

    /// Returns `false` if stopped before the ledger was fully delivered.
    async fn deliver_ledger<H: EventHandler>(
        &self,
        sink: &mut EventSink<'_, H>,
        ledger: &RawLedger,
        filters: &[EventFilter],
    ) -> IngestResult<bool> {
        let events = sink
            .decoder()
            .ledger_events(ledger)
            .map_err(|source| IngestError::Decode {
                ledger: ledger.sequence,
                source,
            })?;

        for raw in &events {
            if self.stop.is_triggered() {
                return Ok(false);
            }
            sink.offer(raw, filters).await?;
        }
        Ok(true)
    }
}
