//! Live ingestion against the retention-bounded source.
//!
//! Each poll covers exactly one ledger: the first page is requested by
//! ledger, further pages by cursor, and the cursor is dropped once the
//! ledger is drained. After a poll the ingestor waits for the next ledger
//! to close unless it is behind the tip and allowed to skip the wait.

use arc_swap::ArcSwap;

use crate::config::EngineConfig;
use crate::event::EventFilter;
use crate::ingest::control::StopSignal;
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::handler::EventHandler;
use crate::ingest::query_health;
use crate::ingest::sink::EventSink;
use crate::ingest::types::Exit;
use crate::observability::metrics;
use crate::source::{EventsRequest, LedgerSource};

/// Result of polling one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerPoll {
    /// Every page was consumed; carries the tip reported by the last page.
    Drained { latest_ledger: u32 },
    /// An event beyond the stop ledger was seen.
    HitStopLedger,
    /// `stop()` was observed mid-poll.
    Stopped,
}

pub(crate) struct LiveIngestor<'a> {
    source: &'a dyn LedgerSource,
    config: &'a EngineConfig,
    filters: &'a ArcSwap<Vec<EventFilter>>,
    stop: &'a StopSignal,
}

impl<'a> LiveIngestor<'a> {
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

    /// Poll ledger after ledger from `start_ledger` until `stop_ledger` is
    /// passed or `stop()` is observed.
    ///
    /// `latest_ledger` is the tip reported by the health check that chose
    /// the start ledger.
    pub(crate) async fn run<H: EventHandler>(
        &self,
        sink: &mut EventSink<'_, H>,
        start_ledger: u32,
        stop_ledger: Option<u32>,
        latest_ledger: u32,
    ) -> IngestResult<Exit> {
        let mut ledger = start_ledger;
        let mut latest = latest_ledger;

        tracing::info!(
            endpoint = %self.source.endpoint(),
            start_ledger,
            stop_ledger = ?stop_ledger,
            latest_ledger,
            "Live ingestion started"
        );

        loop {
            if past_stop(ledger, stop_ledger) {
                return Ok(Exit::completed(ledger));
            }
            if self.stop.is_triggered() {
                return Ok(Exit::stopped(ledger));
            }

            if ledger > latest {
                latest = query_health(self.source).await?.latest_ledger;
                if ledger > latest {
                    tracing::trace!(ledger, latest_ledger = latest, "Ledger not closed yet");
                    if self.stop.sleep(self.config.live_wait_interval()).await {
                        return Ok(Exit::stopped(ledger));
                    }
                    continue;
                }
            }

            match self.poll(sink, ledger, stop_ledger).await? {
                LedgerPoll::Drained { latest_ledger } => latest = latest.max(latest_ledger),
                LedgerPoll::HitStopLedger => {
                    tracing::info!(ledger, stop_ledger = ?stop_ledger, "Reached stop ledger");
                    return Ok(Exit::completed(ledger.saturating_add(1)));
                }
                LedgerPoll::Stopped => return Ok(Exit::stopped(ledger)),
            }

            let should_wait = latest <= ledger;
            ledger = ledger.saturating_add(1);
            metrics::set_cursor_ledger("live", ledger);

            if past_stop(ledger, stop_ledger) {
                continue;
            }
            if should_wait || !self.config.skip_wait_if_behind {
                if self.stop.sleep(self.config.live_wait_interval()).await {
                    return Ok(Exit::stopped(ledger));
                }
            } else {
                tracing::trace!(ledger, latest_ledger = latest, "Behind tip, skipping wait");
            }
        }
    }

    async fn poll<H: EventHandler>(
        &self,
        sink: &mut EventSink<'_, H>,
        ledger: u32,
        stop_ledger: Option<u32>,
    ) -> IngestResult<LedgerPoll> {
        let filters = self.filters.load_full();
        let mut request = EventsRequest::for_ledger(ledger, filters.to_vec(), self.config.page_size);
        metrics::record_poll();

        loop {
            if self.stop.is_triggered() {
                return Ok(LedgerPoll::Stopped);
            }

            let page = self
                .source
                .get_events(&request)
                .await
                .map_err(|e| IngestError::source_failed(self.source.endpoint(), e))?;
            metrics::record_page("live");

            tracing::debug!(
                ledger,
                events = page.events.len(),
                latest_ledger = page.latest_ledger,
                cursor = ?page.cursor,
                "Fetched events page"
            );

            for raw in &page.events {
                // Events are ordered, so a later ledger means this one is drained.
                if raw.ledger > ledger {
                    if stop_ledger == Some(ledger) {
                        return Ok(LedgerPoll::HitStopLedger);
                    }
                    return Ok(LedgerPoll::Drained {
                        latest_ledger: page.latest_ledger,
                    });
                }
                if raw.ledger < ledger {
                    tracing::trace!(id = %raw.id, event_ledger = raw.ledger, ledger, "Event before polled ledger");
                    continue;
                }
                if self.stop.is_triggered() {
                    return Ok(LedgerPoll::Stopped);
                }
                sink.offer(raw, &filters).await?;
            }

            match page.cursor {
                Some(cursor) if !page.events.is_empty() => {
                    request = request.next_page(cursor);
                    if self.stop.sleep(self.config.paging_interval()).await {
                        return Ok(LedgerPoll::Stopped);
                    }
                }
                _ => {
                    return Ok(LedgerPoll::Drained {
                        latest_ledger: page.latest_ledger,
                    })
                }
            }
        }
    }
}

fn past_stop(ledger: u32, stop_ledger: Option<u32>) -> bool {
    stop_ledger.is_some_and(|stop| ledger > stop)
}
