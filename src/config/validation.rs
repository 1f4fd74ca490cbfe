//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs and value ranges
//! - Enforce the paging/poll cadence relationship
//! - Check filters against source limits
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before any network access

use thiserror::Error;

use crate::config::schema::{EngineConfig, IngestorConfig};
use crate::event::validate_filters;

/// Largest page the source accepts.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate the full binary configuration.
pub fn validate_config(config: &IngestorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = match validate_engine_config(&config.engine) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate engine endpoints and tunables.
pub fn validate_engine_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(message) = check_endpoint(&config.live_url) {
        errors.push(ValidationError::new("live_url", message));
    }
    if let Some(archive_url) = &config.archive_url {
        if let Err(message) = check_endpoint(archive_url) {
            errors.push(ValidationError::new("archive_url", message));
        }
    }

    if config.page_size == 0 || config.page_size > MAX_PAGE_SIZE {
        errors.push(ValidationError::new(
            "page_size",
            format!("must be between 1 and {}, got {}", MAX_PAGE_SIZE, config.page_size),
        ));
    }

    if config.paging_interval_ms > config.live_wait_interval_ms {
        errors.push(ValidationError::new(
            "paging_interval_ms",
            format!(
                "paging interval {}ms exceeds live wait interval {}ms",
                config.paging_interval_ms, config.live_wait_interval_ms
            ),
        ));
    }

    if config.dedup_capacity == 0 {
        errors.push(ValidationError::new("dedup_capacity", "must be at least 1"));
    }

    if config.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("rpc_timeout_secs", "must be greater than 0"));
    }

    if let Err(message) = validate_filters(&config.filters) {
        errors.push(ValidationError::new("filters", message));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub(crate) fn check_endpoint(endpoint: &str) -> Result<(), String> {
    let url = url::Url::parse(endpoint).map_err(|e| format!("invalid URL '{}': {}", endpoint, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{}' in '{}'", other, endpoint)),
    }
}
