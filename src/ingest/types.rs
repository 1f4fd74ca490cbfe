//! Ranges and run results.

use uuid::Uuid;

use crate::ingest::error::{IngestError, IngestResult};

/// Ledger range for live and combined runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionRange {
    /// First ledger to deliver; defaults to the live tip.
    pub start_ledger: Option<u32>,
    /// Last ledger to deliver (inclusive); `None` runs until stopped.
    pub stop_ledger: Option<u32>,
}

impl IngestionRange {
    /// Follow the live tip indefinitely.
    pub fn from_tip() -> Self {
        Self::default()
    }

    pub fn starting_at(ledger: u32) -> Self {
        Self {
            start_ledger: Some(ledger),
            stop_ledger: None,
        }
    }

    pub fn between(start_ledger: u32, stop_ledger: u32) -> Self {
        Self {
            start_ledger: Some(start_ledger),
            stop_ledger: Some(stop_ledger),
        }
    }

    pub fn until(mut self, stop_ledger: u32) -> Self {
        self.stop_ledger = Some(stop_ledger);
        self
    }

    /// Reject an explicitly inverted range.
    pub(crate) fn check(&self) -> IngestResult<()> {
        match (self.start_ledger, self.stop_ledger) {
            (Some(start_ledger), Some(stop_ledger)) if start_ledger > stop_ledger => {
                Err(IngestError::InvertedRange {
                    start_ledger,
                    stop_ledger,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Inclusive ledger range for archive runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveRange {
    pub start_ledger: u32,
    pub stop_ledger: u32,
}

impl ArchiveRange {
    pub fn new(start_ledger: u32, stop_ledger: u32) -> Self {
        Self {
            start_ledger,
            stop_ledger,
        }
    }

    pub(crate) fn check(&self) -> IngestResult<()> {
        if self.start_ledger > self.stop_ledger {
            return Err(IngestError::InvertedRange {
                start_ledger: self.start_ledger,
                stop_ledger: self.stop_ledger,
            });
        }
        Ok(())
    }
}

/// How a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The requested range was fully delivered.
    Completed,
    /// `stop()` was observed at a checkpoint.
    Stopped,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Stopped => "stopped",
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub events_delivered: u64,
    /// First ledger not fully processed. Persist it to resume later.
    pub resume_ledger: u32,
}

/// Where an ingestor loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Exit {
    pub outcome: RunOutcome,
    pub resume_ledger: u32,
}

impl Exit {
    pub(crate) fn completed(resume_ledger: u32) -> Self {
        Self {
            outcome: RunOutcome::Completed,
            resume_ledger,
        }
    }

    pub(crate) fn stopped(resume_ledger: u32) -> Self {
        Self {
            outcome: RunOutcome::Stopped,
            resume_ledger,
        }
    }
}
