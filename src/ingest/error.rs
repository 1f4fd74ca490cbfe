//! Ingestion error taxonomy.

use thiserror::Error;

use crate::config::ValidationError;
use crate::event::DecodeError;
use crate::source::SourceError;

/// Boxed error returned by event handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable classification of an [`IngestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid configuration or missing collaborator; fix and rebuild.
    Configuration,
    /// Conflicts with the engine's current state.
    StateConflict,
    /// Requested ledgers are not reachable.
    Range,
    /// A source is unhealthy or a request to it failed.
    SourceUnavailable,
    /// Anything else; the cause is preserved.
    Unexpected,
}

/// Errors that can occur while configuring or running the engine.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Configuration failed validation.
    #[error("invalid configuration: {}", join(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// An archive run was requested with no archive source bound.
    #[error("no archive source is bound")]
    ArchiveNotBound,

    /// A `start*` call was made while a run is in progress.
    #[error("an ingestion run is already in progress")]
    AlreadyRunning,

    /// The archive source was already bound.
    #[error("archive source is already bound to {endpoint}")]
    ArchiveAlreadyBound { endpoint: String },

    /// Start ledger lies before the live retention window and no archive
    /// source can cover it.
    #[error(
        "ledger {start_ledger} is no longer retained (oldest available {oldest_available}, latest {latest_ledger})"
    )]
    NotRetained {
        start_ledger: u32,
        oldest_available: u32,
        latest_ledger: u32,
    },

    /// Start ledger lies beyond the source's tip.
    #[error("ledger {start_ledger} is ahead of the latest ledger {latest_ledger}")]
    AheadOfTip { start_ledger: u32, latest_ledger: u32 },

    /// Start ledger is greater than stop ledger.
    #[error("start ledger {start_ledger} is after stop ledger {stop_ledger}")]
    InvertedRange { start_ledger: u32, stop_ledger: u32 },

    /// Archive could not provide a ledger needed to continue backfill.
    #[error("archive source has no ledger {ledger} (archive latest {archive_latest})")]
    ArchiveGap { ledger: u32, archive_latest: u32 },

    /// Source health check reported unhealthy.
    #[error("source {endpoint} reports unhealthy")]
    Unhealthy { endpoint: String },

    /// A source request failed.
    #[error("source {endpoint} request failed: {source}")]
    Source {
        endpoint: String,
        #[source]
        source: SourceError,
    },

    /// A payload could not be decoded.
    #[error("failed to decode ledger {ledger} payload: {source}")]
    Decode {
        ledger: u32,
        #[source]
        source: DecodeError,
    },

    /// The event handler returned an error.
    #[error("event handler failed on {event_id}: {source}")]
    Handler {
        event_id: String,
        #[source]
        source: BoxError,
    },

    /// Anything else, such as a panicking event handler.
    #[error("unexpected error: {0}")]
    Unexpected(#[source] BoxError),
}

impl IngestError {
    /// Stable discriminant for callers deciding whether to retry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::InvalidConfig(_) | IngestError::ArchiveNotBound => ErrorKind::Configuration,
            IngestError::AlreadyRunning | IngestError::ArchiveAlreadyBound { .. } => {
                ErrorKind::StateConflict
            }
            IngestError::NotRetained { .. }
            | IngestError::AheadOfTip { .. }
            | IngestError::InvertedRange { .. }
            | IngestError::ArchiveGap { .. } => ErrorKind::Range,
            IngestError::Unhealthy { .. } | IngestError::Source { .. } => {
                ErrorKind::SourceUnavailable
            }
            IngestError::Decode { .. } | IngestError::Handler { .. } | IngestError::Unexpected(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    pub(crate) fn source_failed(endpoint: &str, source: SourceError) -> Self {
        IngestError::Source {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
