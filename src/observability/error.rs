//! Telemetry error types.

use thiserror::Error;

/// Errors raised while building or tearing down the telemetry pipeline.
///
/// Request-time export failures never surface here; the SDK drops them.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Collector endpoint could not be turned into a gRPC endpoint.
    #[error("Invalid collector endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Collector did not accept a connection in time.
    #[error("Collector unreachable at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Failed to initialize tracing.
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// A counter could not be registered under the requested name.
    #[error("Failed to register instrument {name:?}: {reason}")]
    InstrumentRegistration { name: String, reason: String },

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Final flush or provider shutdown failed.
    #[error("Telemetry shutdown failed: {0}")]
    Shutdown(String),
}
