//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine, sources and CLI produce:
//!     → logging.rs (tracing subscriber, env filter)
//!     → metrics.rs (counters and gauges through the `metrics` facade)
//!
//! Consumers:
//!     → stderr log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric calls are no-ops until a recorder is installed, so the library
//!   never requires an exporter
//! - Runs are tagged with a run id span rather than a per-event field

pub mod logging;
pub mod metrics;
