//! Ledger event ingestion library.
//!
//! Streams contract events from a retention-bounded live node into a
//! caller-supplied handler, backfilling from an archive node when the
//! requested start has already left the live window.

// Core subsystems
pub mod event;
pub mod ingest;
pub mod source;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::{EngineConfig, IngestorConfig};
pub use event::{ContractEvent, EventFilter, EventType};
pub use ingest::{
    ArchiveRange, ErrorKind, EventHandler, EventIngestor, IngestError, IngestResult,
    IngestionRange, RunOutcome, RunState, RunSummary,
};
pub use source::{LedgerSource, RpcClient};
