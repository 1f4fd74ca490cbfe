//! Event decoding and filtering.
//!
//! # Data Flow
//! ```text
//! RawEvent / RawLedger (from a source)
//!     → decoder.rs (EventDecoder: raw → ContractEvent)
//!     → filter.rs (EventFilter set: keep or drop)
//!     → ingest sink (dedup, deliver)
//! ```

pub mod decoder;
pub mod filter;

pub use decoder::{ContractEvent, DecodeError, EventDecoder, EventType, JsonEventDecoder};
pub use filter::{matches_any, validate_filters, EventFilter};
