//! Dedup, decode, filter and deliver, one event at a time.
//!
//! Both ingestors feed raw events through the same sink so live and
//! backfilled events obey one delivery contract. An event is recorded as
//! seen only after the handler accepted it: a failure between delivery and
//! recording can cause a duplicate, never a loss.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::event::{matches_any, EventDecoder, EventFilter};
use crate::ingest::dedup::DedupWindow;
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::handler::EventHandler;
use crate::observability::metrics;
use crate::source::RawEvent;

/// Which ingestor is feeding the sink; used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FeedMode {
    Live,
    Backfill,
}

impl FeedMode {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Live => "live",
            FeedMode::Backfill => "backfill",
        }
    }
}

/// What happened to an offered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Delivered,
    Duplicate,
    Filtered,
}

pub(crate) struct EventSink<'a, H> {
    handler: H,
    decoder: &'a dyn EventDecoder,
    dedup: DedupWindow,
    mode: FeedMode,
    delivered: u64,
}

impl<'a, H: EventHandler> EventSink<'a, H> {
    pub(crate) fn new(handler: H, decoder: &'a dyn EventDecoder, dedup_capacity: usize) -> Self {
        Self {
            handler,
            decoder,
            dedup: DedupWindow::new(dedup_capacity),
            mode: FeedMode::Live,
            delivered: 0,
        }
    }

    pub(crate) fn set_mode(&mut self, mode: FeedMode) {
        self.mode = mode;
    }

    pub(crate) fn decoder(&self) -> &'a dyn EventDecoder {
        self.decoder
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered
    }

    pub(crate) async fn offer(&mut self, raw: &RawEvent, filters: &[EventFilter]) -> IngestResult<Offer> {
        if self.dedup.seen(&raw.id) {
            tracing::debug!(id = %raw.id, ledger = raw.ledger, "Skipping duplicate event");
            metrics::record_event_skipped("duplicate");
            return Ok(Offer::Duplicate);
        }

        let event = self.decoder.decode(raw).map_err(|source| IngestError::Decode {
            ledger: raw.ledger,
            source,
        })?;

        if !matches_any(filters, &event) {
            self.dedup.record(&raw.id);
            metrics::record_event_skipped("filtered");
            return Ok(Offer::Filtered);
        }

        // A panicking handler fails the run instead of unwinding through it.
        let handler = &mut self.handler;
        let delivery = AssertUnwindSafe(async move { handler.handle(event).await });
        match delivery.catch_unwind().await {
            Ok(result) => result.map_err(|source| IngestError::Handler {
                event_id: raw.id.clone(),
                source,
            })?,
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(id = %raw.id, panic = message, "Event handler panicked");
                return Err(IngestError::Unexpected(
                    format!("event handler panicked on {}: {}", raw.id, message).into(),
                ));
            }
        }

        self.dedup.record(&raw.id);
        self.delivered += 1;
        metrics::record_event_delivered(self.mode.as_str());
        Ok(Offer::Delivered)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
