//! Request, response and error types for ledger sources.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::EventFilter;

/// Health and retention window reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceHealth {
    /// Whether the node reports itself as healthy.
    pub healthy: bool,
    /// Oldest ledger the node still retains.
    pub oldest_ledger: u32,
    /// Most recent closed ledger.
    pub latest_ledger: u32,
    /// Size of the retention window in ledgers.
    pub retention_window: u32,
}

impl SourceHealth {
    /// Oldest ledger that is safe to request, leaving `margin` ledgers of
    /// headroom against the node's own pruning.
    pub fn oldest_available(&self, margin: u32) -> u32 {
        self.oldest_ledger.saturating_add(margin)
    }
}

/// One page request for `getEvents`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventsRequest {
    pub start_ledger: Option<u32>,
    /// Exclusive upper bound.
    pub end_ledger: Option<u32>,
    pub cursor: Option<String>,
    pub filters: Vec<EventFilter>,
    pub limit: u32,
}

impl EventsRequest {
    /// First page of events for a single ledger.
    pub fn for_ledger(ledger: u32, filters: Vec<EventFilter>, limit: u32) -> Self {
        Self {
            start_ledger: Some(ledger),
            end_ledger: Some(ledger.saturating_add(1)),
            cursor: None,
            filters,
            limit,
        }
    }

    /// Continuation page. The start ledger is dropped since the cursor
    /// already encodes the position.
    pub fn next_page(&self, cursor: String) -> Self {
        Self {
            start_ledger: None,
            end_ledger: self.end_ledger,
            cursor: Some(cursor),
            filters: self.filters.clone(),
            limit: self.limit,
        }
    }
}

/// One page of events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventsPage {
    pub events: Vec<RawEvent>,
    pub latest_ledger: u32,
    /// Present only when more pages remain.
    pub cursor: Option<String>,
}

/// Request for a batch of ledger payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgersRequest {
    pub start_ledger: u32,
    pub limit: u32,
}

/// A batch of ledger payloads in ascending sequence order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerPage {
    pub ledgers: Vec<RawLedger>,
    pub latest_ledger: u32,
    pub oldest_ledger: u32,
}

/// An event as returned by the node, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub ledger: u32,
    #[serde(default)]
    pub ledger_closed_at: String,
    #[serde(default)]
    pub contract_id: String,
    pub id: String,
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub in_successful_contract_call: bool,
    #[serde(default)]
    pub tx_hash: String,
}

/// A ledger payload as served by an archive node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLedger {
    pub sequence: u32,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub ledger_close_time: String,
    /// Opaque ledger close metadata; only custom decoders look at it.
    #[serde(default)]
    pub metadata_xdr: String,
    /// Events the node extracted from this ledger.
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Errors returned by a ledger source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection or request failed before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request did not complete in time.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Non-success HTTP status.
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
