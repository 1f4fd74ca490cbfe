//! Event ingestion engine.
//!
//! # Data Flow
//! ```text
//! EventIngestor::start* (engine.rs)
//!     → RunGate (control.rs, single flight)
//!     → ModeArbiter (arbiter.rs) or HistoricalIngestor directly
//!         → HistoricalIngestor (historical.rs, archive batches)
//!         → LiveIngestor (live.rs, one ledger per poll)
//!     → EventSink (sink.rs): dedup → decode → filter → handler → record
//! ```
//!
//! # Design Decisions
//! - One run loop per engine instance; no internal fan-out
//! - The live retention boundary is re-queried after every backfill step
//! - Errors are never retried internally; the run state is released and
//!   the caller resumes from a persisted ledger
//! - `stop()` is cooperative: observed before pages, batches and events,
//!   and it cuts waits short

mod arbiter;
pub mod control;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod handler;
mod historical;
mod live;
mod sink;
pub mod types;

pub use control::RunState;
pub use dedup::DedupWindow;
pub use engine::EventIngestor;
pub use error::{BoxError, ErrorKind, IngestError, IngestResult};
pub use handler::EventHandler;
pub use types::{ArchiveRange, IngestionRange, RunOutcome, RunSummary};

use crate::source::{LedgerSource, SourceHealth};

/// Query `source` health, failing if the node reports itself unhealthy.
pub(crate) async fn query_health(source: &dyn LedgerSource) -> IngestResult<SourceHealth> {
    let health = source
        .get_health()
        .await
        .map_err(|e| IngestError::source_failed(source.endpoint(), e))?;

    if !health.healthy {
        tracing::warn!(endpoint = %source.endpoint(), "Source reports unhealthy");
        return Err(IngestError::Unhealthy {
            endpoint: source.endpoint().to_string(),
        });
    }

    tracing::debug!(
        endpoint = %source.endpoint(),
        oldest_ledger = health.oldest_ledger,
        latest_ledger = health.latest_ledger,
        "Source health"
    );
    Ok(health)
}
