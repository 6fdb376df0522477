//! Rock-paper-scissors HTTP service instrumented with OpenTelemetry.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ http::middleware::telemetry ──▶ http::handlers::play
//!                    (request id,     (server span, HTTP metrics,        │
//!                     timeout,         /health bypassed)                 ▼
//!                     body limit)                                   game::GameService
//!                                                                        │
//!                                                                        ▼
//!                                                          observability::ResultMetrics
//!                                                                        │
//!                           observability::pipeline ◀────────────────────┘
//!                           (one gRPC channel, batch spans, periodic metrics)
//!                                        │
//!                                        ▼
//!                                OTLP collector
//! ```

pub mod config;
pub mod game;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
