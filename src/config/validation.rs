//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer sizes, addresses, log levels)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host must not be empty")]
    EmptyHost,
    #[error("parser.initial_buffer_size must be greater than 0")]
    ZeroBufferSize,
    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every rule and collect all violations.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.parser.initial_buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }

    let level = &config.observability.log_level;
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(level.clone()));
    }

    let metrics_address = &config.observability.metrics_address;
    if config.observability.metrics_enabled && metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
