//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the collector endpoint is a plaintext `http` URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid endpoint {value:?} ({reason})")]
    InvalidEndpoint {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field}: must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("telemetry.bypass_paths: {0:?} must start with '/'")]
    InvalidBypassPath(String),

    #[error("logging.format: expected \"pretty\" or \"json\", got {0:?}")]
    InvalidLogFormat(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Err(reason) = check_endpoint(&config.telemetry.exporter_endpoint) {
        errors.push(ValidationError::InvalidEndpoint {
            field: "telemetry.exporter_endpoint",
            value: config.telemetry.exporter_endpoint.clone(),
            reason,
        });
    }

    let positive = [
        ("listener.shutdown_grace_secs", config.listener.shutdown_grace_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("telemetry.connect_timeout_secs", config.telemetry.connect_timeout_secs),
        ("telemetry.export_timeout_secs", config.telemetry.export_timeout_secs),
        ("telemetry.metric_interval_secs", config.telemetry.metric_interval_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    for path in &config.telemetry.bypass_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidBypassPath(path.clone()));
        }
    }

    if !matches!(config.logging.format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_endpoint(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    // The gRPC channel is plaintext only.
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}, expected \"http\"", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
