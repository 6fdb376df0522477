//! Tower middleware applied around the router.

pub mod telemetry;

pub use telemetry::{TelemetryLayer, TelemetryOptions, TelemetryService, TraceContext};
