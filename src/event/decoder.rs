//! Decoding raw node payloads into structured events.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{RawEvent, RawLedger};

/// Kind of event emitted on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Contract,
    System,
    Diagnostic,
}

impl std::str::FromStr for EventType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contract" => Ok(EventType::Contract),
            "system" => Ok(EventType::System),
            "diagnostic" => Ok(EventType::Diagnostic),
            other => Err(DecodeError::UnknownEventType(other.to_string())),
        }
    }
}

/// A decoded event, as delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    /// Unique, order-preserving event id.
    pub id: String,
    pub event_type: EventType,
    pub ledger: u32,
    pub ledger_closed_at: String,
    /// Emitting contract; absent for system events.
    pub contract_id: Option<String>,
    pub topics: Vec<String>,
    pub value: String,
    pub in_successful_contract_call: bool,
    pub tx_hash: String,
}

/// Errors raised while decoding payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown event type '{0}'")]
    UnknownEventType(String),

    #[error("event is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("event {id} claims ledger {event_ledger} but was found in ledger {ledger}")]
    LedgerMismatch {
        id: String,
        event_ledger: u32,
        ledger: u32,
    },
}

/// Turns node payloads into structured events.
pub trait EventDecoder: Send + Sync {
    /// Decode one raw event.
    fn decode(&self, raw: &RawEvent) -> Result<ContractEvent, DecodeError>;

    /// Raw events contained in a ledger payload, in emission order.
    fn ledger_events(&self, ledger: &RawLedger) -> Result<Vec<RawEvent>, DecodeError>;
}

/// Decoder for nodes that serve events as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventDecoder;

impl EventDecoder for JsonEventDecoder {
    fn decode(&self, raw: &RawEvent) -> Result<ContractEvent, DecodeError> {
        if raw.id.is_empty() {
            return Err(DecodeError::MissingField("id"));
        }
        let event_type: EventType = raw.event_type.parse()?;
        let contract_id = (!raw.contract_id.is_empty()).then(|| raw.contract_id.clone());
        if event_type == EventType::Contract && contract_id.is_none() {
            return Err(DecodeError::MissingField("contractId"));
        }

        Ok(ContractEvent {
            id: raw.id.clone(),
            event_type,
            ledger: raw.ledger,
            ledger_closed_at: raw.ledger_closed_at.clone(),
            contract_id,
            topics: raw.topic.clone(),
            value: raw.value.clone(),
            in_successful_contract_call: raw.in_successful_contract_call,
            tx_hash: raw.tx_hash.clone(),
        })
    }

    fn ledger_events(&self, ledger: &RawLedger) -> Result<Vec<RawEvent>, DecodeError> {
        if let Some(stray) = ledger.events.iter().find(|e| e.ledger != ledger.sequence) {
            return Err(DecodeError::LedgerMismatch {
                id: stray.id.clone(),
                event_ledger: stray.ledger,
                ledger: ledger.sequence,
            });
        }
        Ok(ledger.events.clone())
    }
}
