//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::game::Move;

/// Root configuration for the roshambo service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, shutdown grace).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Game rules.
    pub game: GameConfig,

    /// Trace and metric export.
    pub telemetry: TelemetryConfig,

    /// Local log output.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Seconds to wait for in-flight requests after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            shutdown_grace_secs: 10,
        }
    }
}

/// Timeout configuration for request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}

/// Game configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Move the house throws every round.
    pub opponent_move: Move,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            opponent_move: Move::Paper,
        }
    }
}

/// OpenTelemetry export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP/gRPC collector endpoint.
    pub exporter_endpoint: String,

    /// `service.name` resource attribute.
    pub service_name: String,

    /// `service.version` resource attribute.
    pub service_version: String,

    /// Deadline for establishing the collector connection at startup.
    pub connect_timeout_secs: u64,

    /// Skip the startup connection check and connect on first export.
    pub lazy_connect: bool,

    /// Per-export timeout in seconds.
    pub export_timeout_secs: u64,

    /// Interval between metric exports in seconds.
    pub metric_interval_secs: u64,

    /// Request paths that are never instrumented.
    pub bypass_paths: Vec<String>,

    /// Names of the outcome counters.
    pub instruments: InstrumentNames,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            exporter_endpoint: "http://otel-collector:4317".to_string(),
            service_name: "roshambo".to_string(),
            service_version: "1.23".to_string(),
            connect_timeout_secs: 10,
            lazy_connect: false,
            export_timeout_secs: 30,
            metric_interval_secs: 60,
            bypass_paths: vec!["/health".to_string()],
            instruments: InstrumentNames::default(),
        }
    }
}

/// Counter names for each outcome.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstrumentNames {
    pub wins: String,
    pub losses: String,
    pub draws: String,
}

impl Default for InstrumentNames {
    fn default() -> Self {
        Self {
            wins: "user_wins".to_string(),
            losses: "user_loses".to_string(),
            draws: "user_draws".to_string(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,

    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "roshambo=info,tower_http=info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
