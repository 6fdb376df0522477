//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request middleware and game service produce:
//!     → tracing.rs (request spans, W3C context extraction)
//!     → metrics.rs (outcome counters, HTTP server metrics)
//!     → logging.rs (local structured log events)
//!
//! Export (pipeline.rs):
//!     one gRPC channel to the collector
//!     → batch span processor (traces)
//!     → periodic reader (metrics)
//! ```
//!
//! # Design Decisions
//! - A working collector connection is a startup requirement
//! - Export failures after startup are dropped, never surfaced to requests
//! - Providers are passed down explicitly; nothing is installed globally

pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod tracing;

pub use error::TelemetryError;
pub use metrics::{HttpServerMetrics, ResultMetrics, ResultRecorder, ResultTally, TallySnapshot};
pub use pipeline::TelemetryPipeline;
