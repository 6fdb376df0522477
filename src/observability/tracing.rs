//! Distributed tracing support.
//!
//! # Responsibilities
//! - Build the OTLP span exporter on the shared collector channel
//! - Configure the tracer provider (always-on sampling, batch export)
//! - Name request spans and extract W3C trace context from headers
//!
//! # Design Decisions
//! - Spans are batched and exported off the request path
//! - No global tracer provider; the tracer is handed to the middleware

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, Method};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::trace::{Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use tonic::transport::Channel;

use crate::config::TelemetryConfig;
use crate::observability::TelemetryError;

/// Instrumentation scope for every tracer and meter this service creates.
pub const INSTRUMENTATION_SCOPE: &str = "roshambo";

/// Operation prefix of request span names.
pub const HTTP_OPERATION: &str = "HTTP";

/// Resource attributes shared by spans and metrics.
pub fn service_resource(config: &TelemetryConfig) -> Resource {
    Resource::from_schema_url(
        [
            KeyValue::new(SERVICE_NAME, config.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, config.service_version.clone()),
        ],
        opentelemetry_semantic_conventions::SCHEMA_URL,
    )
}

/// Build a tracer provider exporting over `channel`.
pub fn tracer_provider(
    channel: Channel,
    config: &TelemetryConfig,
) -> Result<TracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_channel(channel)
        .with_timeout(Duration::from_secs(config.export_timeout_secs))
        .build()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(service_resource(config))
        .build();

    Ok(provider)
}

/// Tracer used by the request middleware.
pub fn tracer(provider: &TracerProvider) -> Tracer {
    provider.tracer(INSTRUMENTATION_SCOPE)
}

/// Span name for a request, e.g. `HTTP POST /play`.
pub fn span_name(operation: &str, method: &Method, path: &str) -> String {
    format!("{} {} {}", operation, method, path)
}

/// HTTP header extractor for `http::HeaderMap`.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl opentelemetry::propagation::Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}
