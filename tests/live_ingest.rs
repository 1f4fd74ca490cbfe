//! Live ingestion against a scripted source.

use std::sync::Arc;
use std::time::Duration;

use ledger_ingest::event::{DecodeError, EventDecoder, JsonEventDecoder};
use ledger_ingest::ingest::BoxError;
use ledger_ingest::source::{RawEvent, RawLedger};
use ledger_ingest::{
    ContractEvent, ErrorKind, EventFilter, EventIngestor, EventType, IngestError, IngestionRange,
    LedgerSource, RunOutcome, RunState,
};

mod common;
use common::{contract_event, fast_config, MockSource, RecordingHandler};

fn engine(live: &Arc<MockSource>) -> Arc<EventIngestor> {
    let source: Arc<dyn LedgerSource> = live.clone();
    Arc::new(EventIngestor::with_live_source(fast_config(), source).unwrap())
}

async fn wait_until_running(engine: &EventIngestor) {
    for _ in 0..200 {
        if engine.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run never started");
}

#[tokio::test]
async fn test_delivers_range_in_ledger_order() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_events(500..=502, 2),
    );
    let engine = engine(&live);
    let handler = RecordingHandler::new();

    let summary = engine
        .start_live(handler.clone(), IngestionRange::between(500, 502))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.events_delivered, 6);
    assert_eq!(summary.resume_ledger, 503);
    assert_eq!(handler.ledgers(), vec![500, 500, 501, 501, 502, 502]);
    assert_eq!(live.polled_ledgers(), vec![500, 501, 502]);

    let first = live.event_requests.lock().unwrap()[0].clone();
    assert_eq!(first.end_ledger, Some(501));
    assert_eq!(engine.run_state(), RunState::Idle);
}

#[tokio::test]
async fn test_single_event_within_window() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(90000, 100000)
            .with_event(contract_event(95000, 0, "CTOKEN")),
    );
    let engine = engine(&live);
    let handler = RecordingHandler::new();

    let summary = engine
        .start_live(handler.clone(), IngestionRange::between(95000, 95000))
        .await
        .unwrap();

    assert_eq!(summary.events_delivered, 1);
    assert_eq!(handler.ledgers(), vec![95000]);
    assert_eq!(live.polled_ledgers(), vec![95000]);
}

#[tokio::test]
async fn test_start_before_retention_fails_without_archive() {
    let live = Arc::new(MockSource::new("mock://live").with_window(90000, 100000));
    let engine = engine(&live);

    let err = engine
        .start_live(RecordingHandler::new(), IngestionRange::starting_at(80000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::NotRetained {
            start_ledger: 80000,
            oldest_available: 90010,
            latest_ledger: 100000,
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Range);
    assert!(live.polled_ledgers().is_empty());
    assert_eq!(engine.run_state(), RunState::Idle);
}

#[tokio::test]
async fn test_start_inside_safety_margin_is_not_retained() {
    let live = Arc::new(MockSource::new("mock://live").with_window(90000, 100000));
    let engine = engine(&live);

    let err = engine
        .start_live(RecordingHandler::new(), IngestionRange::starting_at(90005))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NotRetained { .. }));
}

#[tokio::test]
async fn test_start_ahead_of_tip_fails() {
    let live = Arc::new(MockSource::new("mock://live").with_window(100, 1000));
    let engine = engine(&live);

    let err = engine
        .start_live(RecordingHandler::new(), IngestionRange::starting_at(1001))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::AheadOfTip {
            start_ledger: 1001,
            latest_ledger: 1000
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[tokio::test]
async fn test_start_defaults_to_tip() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 200)
            .with_events(199..=200, 1),
    );
    let engine = engine(&live);
    let handler = RecordingHandler::new();

    let summary = engine
        .start_live(handler.clone(), IngestionRange::from_tip().until(200))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(handler.ledgers(), vec![200]);
}

#[tokio::test]
async fn test_tip_past_stop_completes_empty() {
    let live = Arc::new(MockSource::new("mock://live").with_window(100, 200));
    let engine = engine(&live);

    let summary = engine
        .start_live(RecordingHandler::new(), IngestionRange::from_tip().until(150))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.events_delivered, 0);
    assert!(live.polled_ledgers().is_empty());
}

#[tokio::test]
async fn test_inverted_range_rejected_before_any_query() {
    let live = Arc::new(MockSource::new("mock://live").with_window(100, 200));
    let engine = engine(&live);

    let err = engine
        .start_live(RecordingHandler::new(), IngestionRange::between(150, 120))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::InvertedRange { .. }));
    assert_eq!(live.health_calls(), 0);
}

#[tokio::test]
async fn test_overlapping_pages_deliver_each_event_once() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_events(500..=500, 5)
            .with_page_overlap(1),
    );
    let mut config = fast_config();
    config.page_size = 2;
    let source: Arc<dyn LedgerSource> = live.clone();
    let engine = EventIngestor::with_live_source(config, source).unwrap();
    let handler = RecordingHandler::new();

    let summary = engine
        .start_live(handler.clone(), IngestionRange::between(500, 500))
        .await
        .unwrap();

    let ids = handler.ids();
    let mut unique = ids.clone();
    unique.dedup();
    assert_eq!(ids.len(), 5);
    assert_eq!(ids, unique);
    assert_eq!(summary.events_delivered, 5);

    // First page by ledger, then cursor pages with no start ledger.
    let requests = live.event_requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests[1..].iter().all(|r| r.start_ledger.is_none() && r.cursor.is_some()));
}

#[tokio::test]
async fn test_filters_sent_and_applied() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_event(contract_event(500, 0, "CWANT"))
            .with_event(contract_event(500, 1, "COTHER"))
            .with_event(contract_event(500, 2, "CWANT")),
    );
    let engine = engine(&live);
    let filters = vec![EventFilter::contract(["CWANT"])];
    engine.set_filters(filters.clone()).unwrap();
    let handler = RecordingHandler::new();

    engine
        .start_live(handler.clone(), IngestionRange::between(500, 500))
        .await
        .unwrap();

    assert_eq!(handler.len(), 2);
    assert_eq!(live.event_requests.lock().unwrap()[0].filters, filters);

    engine.clear_filters();
    assert!(engine.filters().is_empty());
}

#[tokio::test]
async fn test_invalid_filter_set_rejected() {
    let live = Arc::new(MockSource::new("mock://live"));
    let engine = engine(&live);

    let too_many = vec![EventFilter::contract(["CA"]); 6];
    let err = engine.set_filters(too_many).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(engine.filters().is_empty());
}

#[tokio::test]
async fn test_waits_when_caught_up_until_stopped() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 500)
            .with_events(500..=500, 1),
    );
    let engine = engine(&live);
    let handler = RecordingHandler::new();

    let run = {
        let engine = engine.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            engine
                .start_live(handler, IngestionRange::starting_at(500))
                .await
        })
    };

    wait_until_running(&engine).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.stop();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(summary.resume_ledger, 501);
    assert_eq!(handler.ledgers(), vec![500]);
    // Ledger 501 never closed, so it was never queried.
    assert_eq!(live.polled_ledgers(), vec![500]);
    assert!(live.health_calls() > 1);
    assert_eq!(engine.run_state(), RunState::Idle);
}

#[tokio::test]
async fn test_stop_from_handler_is_observed_before_next_event() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_events(500..=500, 5),
    );
    let engine = engine(&live);

    let stopper = engine.clone();
    let mut delivered = 0;
    let handler = move |_event: ContractEvent| {
        delivered += 1;
        if delivered == 3 {
            stopper.stop();
        }
        async { Ok::<(), BoxError>(()) }
    };

    let summary = engine
        .start_live(handler, IngestionRange::between(500, 600))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(summary.events_delivered, 3);
    assert_eq!(summary.resume_ledger, 500);
}

#[tokio::test]
async fn test_stop_while_idle_does_not_affect_next_run() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_events(500..=500, 1),
    );
    let engine = engine(&live);
    engine.stop();

    let summary = engine
        .start_live(RecordingHandler::new(), IngestionRange::between(500, 500))
        .await
        .unwrap();
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.events_delivered, 1);
}

#[tokio::test]
async fn test_second_start_fails_fast_while_running() {
    let live = Arc::new(MockSource::new("mock://live").with_window(100, 500));
    let engine = engine(&live);

    let run = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .start_live(RecordingHandler::new(), IngestionRange::starting_at(500))
                .await
        })
    };
    wait_until_running(&engine).await;

    let err = engine
        .start_live(RecordingHandler::new(), IngestionRange::starting_at(500))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::AlreadyRunning));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let err = engine
        .start(RecordingHandler::new(), IngestionRange::between(10, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::AlreadyRunning));

    // The in-flight run is undisturbed.
    assert!(engine.is_running());
    engine.stop();
    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(engine.run_state(), RunState::Idle);
}

#[tokio::test]
async fn test_filters_reload_between_polls() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_event(contract_event(500, 0, "CFIRST"))
            .with_event(contract_event(501, 0, "CSECOND")),
    );
    let engine = engine(&live);
    engine.set_filters(vec![EventFilter::contract(["CFIRST"])]).unwrap();

    let reloader = engine.clone();
    let handler = move |event: ContractEvent| {
        if event.ledger == 500 {
            reloader
                .set_filters(vec![EventFilter::contract(["CSECOND"])])
                .unwrap();
        }
        async { Ok::<(), BoxError>(()) }
    };

    let summary = engine
        .start_live(handler, IngestionRange::between(500, 501))
        .await
        .unwrap();

    assert_eq!(summary.events_delivered, 2);
    let requests = live.event_requests.lock().unwrap();
    assert_eq!(requests[1].filters, vec![EventFilter::contract(["CSECOND"])]);
}

struct SystemOnlyDecoder;

impl EventDecoder for SystemOnlyDecoder {
    fn decode(&self, raw: &RawEvent) -> Result<ContractEvent, DecodeError> {
        let mut event = JsonEventDecoder.decode(raw)?;
        event.event_type = EventType::System;
        Ok(event)
    }

    fn ledger_events(&self, ledger: &RawLedger) -> Result<Vec<RawEvent>, DecodeError> {
        JsonEventDecoder.ledger_events(ledger)
    }
}

#[tokio::test]
async fn test_custom_decoder_output_is_filtered() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_events(500..=500, 3),
    );
    let source: Arc<dyn LedgerSource> = live.clone();
    let engine = EventIngestor::with_live_source(fast_config(), source)
        .unwrap()
        .with_decoder(Arc::new(SystemOnlyDecoder));
    let contract_only = EventFilter {
        event_type: Some(EventType::Contract),
        ..EventFilter::default()
    };
    engine.set_filters(vec![contract_only]).unwrap();
    let handler = RecordingHandler::new();

    let summary = engine
        .start_live(handler.clone(), IngestionRange::between(500, 500))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(handler.len(), 0);
}

fn behind_tip_engine(live: &Arc<MockSource>, skip_wait_if_behind: bool) -> EventIngestor {
    let mut config = fast_config();
    config.live_wait_interval_ms = 400;
    config.skip_wait_if_behind = skip_wait_if_behind;
    let source: Arc<dyn LedgerSource> = live.clone();
    EventIngestor::with_live_source(config, source).unwrap()
}

#[tokio::test]
async fn test_behind_tip_skips_wait_between_ledgers() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_events(500..=503, 1),
    );
    let engine = behind_tip_engine(&live, true);
    let handler = RecordingHandler::new();

    let started = std::time::Instant::now();
    let summary = engine
        .start_live(handler.clone(), IngestionRange::between(500, 503))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(handler.ledgers(), vec![500, 501, 502, 503]);
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_behind_tip_waits_when_skip_disabled() {
    let live = Arc::new(
        MockSource::new("mock://live")
            .with_window(100, 1000)
            .with_events(500..=503, 1),
    );
    let engine = behind_tip_engine(&live, false);
    let handler = RecordingHandler::new();

    let started = std::time::Instant::now();
    let summary = engine
        .start_live(handler.clone(), IngestionRange::between(500, 503))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(handler.ledgers(), vec![500, 501, 502, 503]);
    // One wait between each pair of ledgers, none after the stop ledger.
    assert!(
        started.elapsed() >= Duration::from_millis(3 * 400),
        "took {:?}",
        started.elapsed()
    );
}
