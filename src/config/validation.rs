//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, limits > 0)
//! - Check that listener addresses parse and do not collide
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("backend.address: expected host:port, got {0:?}")]
    InvalidBackend(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("stats.header_name: {0:?} is not a valid header name")]
    InvalidHeaderName(String),

    #[error("observability.log_format: expected \"pretty\" or \"json\", got {0:?}")]
    InvalidLogFormat(String),

    #[error("{first} and {second} share bind address {address}")]
    AddressConflict {
        first: &'static str,
        second: &'static str,
        address: SocketAddr,
    },
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut bound: Vec<(&'static str, SocketAddr)> = Vec::new();
    let mut check_addr = |field: &'static str, value: &str, errors: &mut Vec<ValidationError>| {
        match value.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Some((first, _)) = bound.iter().find(|(_, a)| *a == addr && addr.port() != 0) {
                    errors.push(ValidationError::AddressConflict {
                        first: *first,
                        second: field,
                        address: addr,
                    });
                }
                bound.push((field, addr));
            }
            Err(_) => errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            }),
        }
    };

    check_addr("listener.bind_address", &config.listener.bind_address, &mut errors);
    if config.rpc.enabled {
        check_addr("rpc.bind_address", &config.rpc.bind_address, &mut errors);
    }
    if config.origin.enabled {
        check_addr("origin.bind_address", &config.origin.bind_address, &mut errors);
    }
    if config.observability.metrics_enabled {
        check_addr(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if !is_host_port(&config.backend.address) {
        errors.push(ValidationError::InvalidBackend(config.backend.address.clone()));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if config.pool.capacity == 0 {
        errors.push(ValidationError::Zero("pool.capacity"));
    }
    if config.pool.acquire_timeout_ms == 0 {
        errors.push(ValidationError::Zero("pool.acquire_timeout_ms"));
    }
    if config.limits.max_head_bytes == 0 {
        errors.push(ValidationError::Zero("limits.max_head_bytes"));
    }
    if config.limits.max_headers == 0 {
        errors.push(ValidationError::Zero("limits.max_headers"));
    }

    if HeaderName::from_bytes(config.stats.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(config.stats.header_name.clone()));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::InvalidLogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a numeric port. Hostnames are allowed
/// since the backend is resolved at dial time.
fn is_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
