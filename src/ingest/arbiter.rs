//! Chooses between backfill and live ingestion for combined runs.
//!
//! # State Transitions
//! ```text
//! Deciding → Live:        start within the live retention window
//! Deciding → Backfilling: start before the window and an archive is bound
//! Backfilling → Deciding: batch range delivered; the window is re-queried
//!                         since it may have moved during backfill
//! ```

use arc_swap::ArcSwap;

use crate::config::EngineConfig;
use crate::event::EventFilter;
use crate::ingest::control::StopSignal;
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::handler::EventHandler;
use crate::ingest::historical::HistoricalIngestor;
use crate::ingest::live::LiveIngestor;
use crate::ingest::query_health;
use crate::ingest::sink::{EventSink, FeedMode};
use crate::ingest::types::{Exit, IngestionRange, RunOutcome};
use crate::source::LedgerSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Deciding { start_ledger: Option<u32> },
    Backfilling { start_ledger: u32, target_ledger: u32 },
    Live { start_ledger: u32, latest_ledger: u32 },
}

pub(crate) struct ModeArbiter<'a> {
    live: &'a dyn LedgerSource,
    archive: Option<&'a dyn LedgerSource>,
    config: &'a EngineConfig,
    filters: &'a ArcSwap<Vec<EventFilter>>,
    stop: &'a StopSignal,
}

impl<'a> ModeArbiter<'a> {
    pub(crate) fn new(
        live: &'a dyn LedgerSource,
        archive: Option<&'a dyn LedgerSource>,
        config: &'a EngineConfig,
        filters: &'a ArcSwap<Vec<EventFilter>>,
        stop: &'a StopSignal,
    ) -> Self {
        Self {
            live,
            archive,
            config,
            filters,
            stop,
        }
    }

    pub(crate) async fn run<H: EventHandler>(
        &self,
        sink: &mut EventSink<'_, H>,
        range: IngestionRange,
    ) -> IngestResult<Exit> {
        let stop_ledger = range.stop_ledger;
        let mut mode = Mode::Deciding {
            start_ledger: range.start_ledger,
        };

        loop {
            mode = match mode {
                Mode::Deciding { start_ledger } => {
                    match self.decide(start_ledger, stop_ledger).await? {
                        Ok(next) => next,
                        Err(exit) => return Ok(exit),
                    }
                }
                Mode::Backfilling {
                    start_ledger,
                    target_ledger,
                } => {
                    sink.set_mode(FeedMode::Backfill);
                    let archive = self.archive.ok_or(IngestError::ArchiveNotBound)?;
                    let exit = HistoricalIngestor::new(archive, self.config, self.filters, self.stop)
                        .run(sink, start_ledger, target_ledger)
                        .await?;
                    if exit.outcome != RunOutcome::Completed {
                        return Ok(exit);
                    }
                    Mode::Deciding {
                        start_ledger: Some(exit.resume_ledger),
                    }
                }
                Mode::Live {
                    start_ledger,
                    latest_ledger,
                } => {
                    sink.set_mode(FeedMode::Live);
                    return LiveIngestor::new(self.live, self.config, self.filters, self.stop)
                        .run(sink, start_ledger, stop_ledger, latest_ledger)
                        .await;
                }
            };
        }
    }

    /// Pick the next mode, or the exit if nothing is left to do.
    async fn decide(
        &self,
        start_ledger: Option<u32>,
        stop_ledger: Option<u32>,
    ) -> IngestResult<Result<Mode, Exit>> {
        if let (Some(start), Some(stop)) = (start_ledger, stop_ledger) {
            if start > stop {
                return Ok(Err(Exit::completed(start)));
            }
        }
        let health = query_health(self.live).await?;
        let oldest_available = health.oldest_available(self.config.retention_safety_margin);

        let start = match start_ledger {
            Some(start) => start,
            None => {
                let start = health.latest_ledger;
                if stop_ledger.is_some_and(|stop| start > stop) {
                    tracing::info!(
                        latest_ledger = start,
                        stop_ledger = ?stop_ledger,
                        "Tip already past stop ledger"
                    );
                    return Ok(Err(Exit::completed(start)));
                }
                start
            }
        };

        if self.stop.is_triggered() {
            return Ok(Err(Exit::stopped(start)));
        }

        if start > health.latest_ledger {
            return Err(IngestError::AheadOfTip {
                start_ledger: start,
                latest_ledger: health.latest_ledger,
            });
        }

        if start >= oldest_available {
            tracing::debug!(start_ledger = start, oldest_available, "Start within retention window");
            return Ok(Ok(Mode::Live {
                start_ledger: start,
                latest_ledger: health.latest_ledger,
            }));
        }

        if self.archive.is_none() {
            return Err(IngestError::NotRetained {
                start_ledger: start,
                oldest_available,
                latest_ledger: health.latest_ledger,
            });
        }

        // oldest_available > start, so this cannot underflow.
        let mut target_ledger = oldest_available - 1;
        if let Some(stop) = stop_ledger {
            target_ledger = target_ledger.min(stop);
        }
        tracing::info!(
            start_ledger = start,
            target_ledger,
            oldest_available,
            "Start before retention window, backfilling from archive"
        );
        Ok(Ok(Mode::Backfilling {
            start_ledger: start,
            target_ledger,
        }))
    }
}
