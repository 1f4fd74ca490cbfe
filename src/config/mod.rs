//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → IngestorConfig (validated, immutable)
//!     → EngineConfig handed to EventIngestor
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new filter set pushed into the running engine
//! ```
//!
//! # Design Decisions
//! - Engine config is immutable once loaded; only filters hot-reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::EngineConfig;
pub use schema::IngestorConfig;
pub use schema::ObservabilityConfig;
pub use validation::ValidationError;
