//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → EventIngestor::stop()
//!     → run loop exits at its next checkpoint → RunSummary
//!     second SIGTERM/SIGINT → forced exit
//! ```
//!
//! # Design Decisions
//! - Stopping is cooperative; the handler is never interrupted mid-event
//! - The resume ledger from the summary is what callers persist

pub mod signals;

pub use signals::{shutdown_signal, spawn_stop_on_signal};
