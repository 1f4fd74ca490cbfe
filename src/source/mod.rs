//! Remote ledger source subsystem.
//!
//! # Data Flow
//! ```text
//! EventIngestor
//!     → LedgerSource (trait, shared read-only handle)
//!         → rpc.rs (JSON-RPC over HTTP, per-call timeout)
//!     ← SourceHealth / EventsPage / LedgerPage
//! ```
//!
//! # Design Decisions
//! - Live and archive sources share one capability trait; only the
//!   retention boundary differs between them
//! - Futures are boxed so sources can be held as `Arc<dyn LedgerSource>`
//! - No retries or failover: a failed call surfaces to the run loop

pub mod rpc;
pub mod types;

use futures_util::future::BoxFuture;

pub use rpc::RpcClient;
pub use types::{
    EventsPage, EventsRequest, LedgerPage, LedgersRequest, RawEvent, RawLedger, SourceError,
    SourceHealth, SourceResult,
};

/// A node that serves ledger events and, optionally, full ledger payloads.
pub trait LedgerSource: Send + Sync {
    /// Endpoint identity, used for logs, metrics and error context.
    fn endpoint(&self) -> &str;

    /// Query the node's health and retained ledger range.
    fn get_health(&self) -> BoxFuture<'_, SourceResult<SourceHealth>>;

    /// Fetch one page of events.
    fn get_events<'a>(&'a self, request: &'a EventsRequest) -> BoxFuture<'a, SourceResult<EventsPage>>;

    /// Fetch a batch of ledger payloads starting at `request.start_ledger`.
    fn get_ledgers<'a>(
        &'a self,
        request: &'a LedgersRequest,
    ) -> BoxFuture<'a, SourceResult<LedgerPage>>;
}
