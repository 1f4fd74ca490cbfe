//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingest_events_delivered_total` (counter): events handed to the handler, by mode
//! - `ingest_events_skipped_total` (counter): events not delivered, by reason
//! - `ingest_polls_total` (counter): live ledger polls
//! - `ingest_pages_total` (counter): source pages fetched, by mode
//! - `ingest_backfill_ledgers_total` (counter): ledgers read from the archive
//! - `ingest_source_healthy` (gauge): 1=healthy, 0=unhealthy, by endpoint
//! - `ingest_cursor_ledger` (gauge): next ledger to process, by mode
//! - `ingest_runs_total` (counter): finished runs, by mode and outcome

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Returns `false` if the exporter could not be installed; ingestion keeps
/// running without metrics in that case.
pub fn init_metrics(addr: SocketAddr) -> bool {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
            true
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
            false
        }
    }
}

fn describe_metrics() {
    describe_counter!(
        "ingest_events_delivered_total",
        "Events delivered to the handler"
    );
    describe_counter!(
        "ingest_events_skipped_total",
        "Events skipped as duplicates or by filters"
    );
    describe_counter!("ingest_polls_total", "Live ledger polls");
    describe_counter!("ingest_pages_total", "Pages fetched from sources");
    describe_counter!(
        "ingest_backfill_ledgers_total",
        "Ledgers read from the archive source"
    );
    describe_gauge!("ingest_source_healthy", "Source health (1=healthy)");
    describe_gauge!("ingest_cursor_ledger", "Next ledger to process");
    describe_counter!("ingest_runs_total", "Finished ingestion runs");
}

pub fn record_source_health(endpoint: &str, healthy: bool) {
    gauge!("ingest_source_healthy", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_event_delivered(mode: &'static str) {
    counter!("ingest_events_delivered_total", "mode" => mode).increment(1);
}

pub fn record_event_skipped(reason: &'static str) {
    counter!("ingest_events_skipped_total", "reason" => reason).increment(1);
}

pub fn record_poll() {
    counter!("ingest_polls_total").increment(1);
}

pub fn record_page(mode: &'static str) {
    counter!("ingest_pages_total", "mode" => mode).increment(1);
}

pub fn record_backfill_ledgers(count: u32) {
    counter!("ingest_backfill_ledgers_total").increment(u64::from(count));
}

pub fn set_cursor_ledger(mode: &'static str, ledger: u32) {
    gauge!("ingest_cursor_ledger", "mode" => mode).set(f64::from(ledger));
}

pub fn record_run(mode: &'static str, outcome: &'static str) {
    counter!("ingest_runs_total", "mode" => mode, "outcome" => outcome).increment(1);
}
