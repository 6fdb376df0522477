//! Collector connection and provider lifecycle.

use std::time::Duration;

use opentelemetry::metrics::Meter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use tonic::transport::{Channel, Endpoint};

use crate::config::TelemetryConfig;
use crate::observability::{metrics, tracing, TelemetryError};

/// Tracer and meter providers sharing one collector channel.
///
/// Created once at startup; every request multiplexes over it.
pub struct TelemetryPipeline {
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryPipeline {
    /// Open the collector channel and build both providers on it.
    pub async fn connect(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let channel = connect_channel(config).await?;
        let tracer_provider = tracing::tracer_provider(channel.clone(), config)?;
        let meter_provider = metrics::meter_provider(channel, config)?;
        Ok(Self::from_providers(tracer_provider, meter_provider))
    }

    /// Wrap providers built elsewhere, e.g. on in-memory exporters.
    pub fn from_providers(tracer_provider: TracerProvider, meter_provider: SdkMeterProvider) -> Self {
        Self {
            tracer_provider,
            meter_provider,
        }
    }

    pub fn tracer(&self) -> Tracer {
        tracing::tracer(&self.tracer_provider)
    }

    pub fn meter(&self) -> Meter {
        metrics::meter(&self.meter_provider)
    }

    /// Flush and stop both providers.
    ///
    /// Blocks while the final export runs; call it off the async workers.
    pub fn shutdown(self) -> Result<(), TelemetryError> {
        let mut failures = Vec::new();
        if let Err(e) = self.tracer_provider.shutdown() {
            failures.push(format!("traces: {e}"));
        }
        if let Err(e) = self.meter_provider.shutdown() {
            failures.push(format!("metrics: {e}"));
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TelemetryError::Shutdown(failures.join("; ")))
        }
    }
}

async fn connect_channel(config: &TelemetryConfig) -> Result<Channel, TelemetryError> {
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let endpoint = Endpoint::from_shared(config.exporter_endpoint.clone())
        .map_err(|e| TelemetryError::InvalidEndpoint {
            endpoint: config.exporter_endpoint.clone(),
            reason: e.to_string(),
        })?
        .connect_timeout(connect_timeout);

    if config.lazy_connect {
        return Ok(endpoint.connect_lazy());
    }

    let unreachable = |reason: String| TelemetryError::Connect {
        endpoint: config.exporter_endpoint.clone(),
        reason,
    };
    match tokio::time::timeout(connect_timeout, endpoint.connect()).await {
        Ok(Ok(channel)) => Ok(channel),
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_) => Err(unreachable(format!("no connection within {connect_timeout:?}"))),
    }
}
