//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, body limit)
//!     → middleware/telemetry.rs (server span + HTTP metrics, skipped on /health)
//!     → handlers.rs (decode selection, play round, encode outcome)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use handlers::{AppState, PlayError};
pub use middleware::{TelemetryLayer, TelemetryOptions, TraceContext};
pub use server::{HttpServer, ServerError};
