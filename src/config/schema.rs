//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the ingestor.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::event::EventFilter;

/// Root configuration for the `ledger-ingest` binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IngestorConfig {
    /// Engine endpoints, filters and tunables.
    pub engine: EngineConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Event ingestion engine configuration.
///
/// Immutable once the engine is built; only the filter set can change at
/// run time.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// JSON-RPC endpoint of the live node (bounded retention).
    pub live_url: String,

    /// JSON-RPC endpoint of the archive node (unbounded history).
    pub archive_url: Option<String>,

    /// Initial event filters.
    pub filters: Vec<EventFilter>,

    /// Events or ledgers requested per page.
    pub page_size: u32,

    /// Poll interval once caught up with the live tip, in milliseconds.
    pub live_wait_interval_ms: u64,

    /// Delay between successive pages of one poll, in milliseconds.
    pub paging_interval_ms: u64,

    /// Delay between backfill batches, in milliseconds.
    pub archival_interval_ms: u64,

    /// Skip the poll wait while behind the live tip.
    pub skip_wait_if_behind: bool,

    /// Ledgers added to the live node's oldest ledger before it is
    /// considered reachable.
    pub retention_safety_margin: u32,

    /// Number of recently delivered event ids remembered for dedup.
    pub dedup_capacity: usize,

    /// Timeout for each source request, in seconds.
    pub rpc_timeout_secs: u64,
}

impl EngineConfig {
    /// Default configuration pointed at `live_url`.
    pub fn new(live_url: impl Into<String>) -> Self {
        Self {
            live_url: live_url.into(),
            ..Self::default()
        }
    }

    pub fn live_wait_interval(&self) -> Duration {
        Duration::from_millis(self.live_wait_interval_ms)
    }

    pub fn paging_interval(&self) -> Duration {
        Duration::from_millis(self.paging_interval_ms)
    }

    pub fn archival_interval(&self) -> Duration {
        Duration::from_millis(self.archival_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            live_url: "http://localhost:8000".to_string(),
            archive_url: None,
            filters: Vec::new(),
            page_size: 100,
            live_wait_interval_ms: 5000,
            paging_interval_ms: 100,
            archival_interval_ms: 500,
            skip_wait_if_behind: true,
            retention_safety_margin: 10,
            dedup_capacity: 25,
            rpc_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
