//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect telemetry and register instruments before taking traffic
//! - Build the game service and HTTP stack from configuration
//! - Bind the listener, serve, then flush telemetry on the way out
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use opentelemetry::metrics::Meter;
use opentelemetry_sdk::trace::Tracer;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServiceConfig;
use crate::game::{FixedMove, GameService};
use crate::http::{AppState, HttpServer, ServerError, TelemetryLayer, TelemetryOptions};
use crate::observability::tracing::HTTP_OPERATION;
use crate::observability::{ResultMetrics, TelemetryError, TelemetryPipeline};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Wire the game service and HTTP stack onto the given tracer and meter.
///
/// Fails if the outcome counters cannot be registered.
pub fn build_server(
    config: &ServiceConfig,
    tracer: Tracer,
    meter: &Meter,
) -> Result<HttpServer, StartupError> {
    let metrics = ResultMetrics::new(meter, &config.telemetry.instruments)?;
    let tally = metrics.tally();
    let game = GameService::new(
        Arc::new(FixedMove(config.game.opponent_move)),
        Arc::new(metrics),
    );

    let state = AppState {
        game,
        tally,
        version: config.telemetry.service_version.clone(),
    };
    let telemetry = TelemetryLayer::new(
        tracer,
        meter,
        TelemetryOptions {
            operation: HTTP_OPERATION.to_string(),
            bypass_paths: config.telemetry.bypass_paths.clone(),
        },
    );

    Ok(HttpServer::new(config, state, telemetry))
}

/// Run the service until `shutdown` fires.
///
/// Telemetry is flushed even when serving fails; the serving error wins.
pub async fn run(
    config: ServiceConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    let pipeline = TelemetryPipeline::connect(&config.telemetry).await?;
    tracing::info!(
        endpoint = %config.telemetry.exporter_endpoint,
        "Telemetry pipeline connected"
    );

    let served = serve(&config, &pipeline, shutdown).await;
    let flushed = shutdown_telemetry(pipeline).await;

    served?;
    flushed?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn serve(
    config: &ServiceConfig,
    pipeline: &TelemetryPipeline,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    let server = build_server(config, pipeline.tracer(), &pipeline.meter())?;

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    server.run(listener, shutdown).await?;
    Ok(())
}

/// Provider shutdown blocks on the final export, so keep it off the async workers.
async fn shutdown_telemetry(pipeline: TelemetryPipeline) -> Result<(), TelemetryError> {
    match tokio::task::spawn_blocking(move || pipeline.shutdown()).await {
        Ok(result) => result,
        Err(e) => Err(TelemetryError::Shutdown(e.to_string())),
    }
}
