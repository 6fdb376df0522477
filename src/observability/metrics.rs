//! Metrics collection and export.
//!
//! # Responsibilities
//! - Count round outcomes (the business metric)
//! - Record per-request HTTP server metrics for the middleware
//! - Push both to the collector on a periodic reader
//!
//! # Metrics
//! - `user_wins` / `user_loses` / `user_draws` (counter): outcomes, names configurable
//! - `http.server.request.duration` (histogram, seconds): latency by method, path, status
//! - `http.server.requests` (counter): requests by method, path, status
//!
//! # Design Decisions
//! - Instruments are created once at startup; bad names fail startup
//! - Recording is a synchronous in-memory add; export runs on its own schedule
//! - Outcomes are mirrored in atomic counters for the `/stats` endpoint

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::runtime;
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE,
};
use serde::Serialize;
use tonic::transport::Channel;

use crate::config::{InstrumentNames, TelemetryConfig};
use crate::game::Outcome;
use crate::observability::tracing::{service_resource, INSTRUMENTATION_SCOPE};
use crate::observability::TelemetryError;

/// Attribute carrying the raw request path, as the collector dashboards expect.
pub const HTTP_PATH: &str = "http.path";

const MAX_INSTRUMENT_NAME_LEN: usize = 255;

/// Meters the outcome of each round.
///
/// Implementations must not fail or block; problems are logged and dropped.
pub trait ResultRecorder: Send + Sync {
    fn record_result(&self, cx: &Context, outcome: Outcome);
}

/// In-process outcome counters.
#[derive(Debug, Default)]
pub struct ResultTally {
    wins: AtomicU64,
    losses: AtomicU64,
    draws: AtomicU64,
}

/// Point-in-time copy of a [`ResultTally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
}

impl TallySnapshot {
    pub fn total(&self) -> u64 {
        self.wins + self.losses + self.draws
    }
}

impl ResultTally {
    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            wins: self.wins.load(Ordering::Relaxed),
            losses: self.losses.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
        }
    }

    fn counter(&self, outcome: Outcome) -> &AtomicU64 {
        match outcome {
            Outcome::Win => &self.wins,
            Outcome::Lose => &self.losses,
            Outcome::Draw => &self.draws,
        }
    }
}

impl ResultRecorder for ResultTally {
    fn record_result(&self, _cx: &Context, outcome: Outcome) {
        self.counter(outcome).fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome counters exported through OpenTelemetry.
pub struct ResultMetrics {
    wins: Counter<u64>,
    losses: Counter<u64>,
    draws: Counter<u64>,
    tally: Arc<ResultTally>,
}

impl ResultMetrics {
    /// Register the three outcome counters on `meter`.
    ///
    /// Fails if a name breaks the instrument naming rules or two outcomes
    /// share a name. Registering the same names again on the same meter
    /// yields counters bound to the same streams.
    pub fn new(meter: &Meter, names: &InstrumentNames) -> Result<Self, TelemetryError> {
        let mut seen = HashSet::new();
        for name in [&names.wins, &names.losses, &names.draws] {
            validate_instrument_name(name).map_err(|reason| {
                TelemetryError::InstrumentRegistration {
                    name: name.clone(),
                    reason,
                }
            })?;
            if !seen.insert(name.as_str()) {
                return Err(TelemetryError::InstrumentRegistration {
                    name: name.clone(),
                    reason: "already used by another outcome".to_string(),
                });
            }
        }

        let wins = meter
            .u64_counter(names.wins.clone())
            .with_description("amount of time the user has won")
            .build();
        let losses = meter
            .u64_counter(names.losses.clone())
            .with_description("amount of time the user has lost")
            .build();
        let draws = meter
            .u64_counter(names.draws.clone())
            .with_description("amount of time the user has drawn")
            .build();

        Ok(Self {
            wins,
            losses,
            draws,
            tally: Arc::new(ResultTally::default()),
        })
    }

    /// Shared handle to the in-process mirror of the counters.
    pub fn tally(&self) -> Arc<ResultTally> {
        self.tally.clone()
    }
}

impl ResultRecorder for ResultMetrics {
    fn record_result(&self, cx: &Context, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Win => &self.wins,
            Outcome::Lose => &self.losses,
            Outcome::Draw => &self.draws,
        };
        counter.add(1, &[]);
        self.tally.record_result(cx, outcome);

        let span_context = cx.span().span_context().clone();
        if span_context.is_valid() {
            tracing::trace!(
                trace_id = %span_context.trace_id(),
                outcome = outcome.label(),
                "Outcome recorded"
            );
        }
    }
}

/// Check a name against the OpenTelemetry instrument name syntax.
pub fn validate_instrument_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("name is empty".to_string()),
        Some(c) if !c.is_ascii_alphabetic() => {
            return Err("must start with an ASCII letter".to_string())
        }
        Some(_) => {}
    }
    if name.len() > MAX_INSTRUMENT_NAME_LEN {
        return Err(format!("longer than {MAX_INSTRUMENT_NAME_LEN} characters"));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || "_.-/".contains(*c))) {
        return Err(format!("invalid character {bad:?}"));
    }
    Ok(())
}

/// Per-request metrics recorded by the telemetry middleware.
#[derive(Clone)]
pub struct HttpServerMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
}

impl HttpServerMetrics {
    pub fn new(meter: &Meter) -> Self {
        let duration = meter
            .f64_histogram("http.server.request.duration")
            .with_unit("s")
            .with_description("Duration of HTTP server requests")
            .build();
        let requests = meter
            .u64_counter("http.server.requests")
            .with_description("Number of HTTP server requests")
            .build();
        Self { duration, requests }
    }

    /// Record one finished request. `status` is `None` when the handler failed
    /// without producing a response.
    pub fn record(&self, method: &str, path: &str, status: Option<StatusCode>, elapsed: Duration) {
        let mut attributes = vec![
            KeyValue::new(HTTP_REQUEST_METHOD, method.to_string()),
            KeyValue::new(HTTP_PATH, path.to_string()),
        ];
        if let Some(status) = status {
            attributes.push(KeyValue::new(
                HTTP_RESPONSE_STATUS_CODE,
                i64::from(status.as_u16()),
            ));
        }
        self.duration.record(elapsed.as_secs_f64(), &attributes);
        self.requests.add(1, &attributes);
    }
}

/// Build a meter provider pushing to the collector over `channel`.
pub fn meter_provider(
    channel: Channel,
    config: &TelemetryConfig,
) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_channel(channel)
        .with_timeout(Duration::from_secs(config.export_timeout_secs))
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(Duration::from_secs(config.metric_interval_secs))
        .with_timeout(Duration::from_secs(config.export_timeout_secs))
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(service_resource(config))
        .build())
}

/// Meter shared by the outcome counters and the middleware.
pub fn meter(provider: &SdkMeterProvider) -> Meter {
    provider.meter(INSTRUMENTATION_SCOPE)
}
