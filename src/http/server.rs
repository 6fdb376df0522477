//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the game handlers
//! - Wire up middleware (telemetry, timeout, body limit, request ID, trace logs)
//! - Serve a listener until shutdown, then drain within a grace period

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::http::handlers::{health, play, stats, AppState};
use crate::http::middleware::TelemetryLayer;
use crate::observability::ResultTally;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("in-flight requests did not finish within {0:?}")]
    DrainTimeout(Duration),
}

/// HTTP server for the game service.
pub struct HttpServer {
    router: Router,
    tally: Arc<ResultTally>,
    grace: Duration,
}

impl HttpServer {
    /// Create a server; `telemetry` wraps every route.
    pub fn new(config: &ServiceConfig, state: AppState, telemetry: TelemetryLayer) -> Self {
        let tally = state.tally.clone();
        let router = Self::build_router(config, state, telemetry);
        Self {
            router,
            tally,
            grace: Duration::from_secs(config.listener.shutdown_grace_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: request ID, trace logs, request ID echo, telemetry,
    /// timeout, body limit.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState, telemetry: TelemetryLayer) -> Router {
        Router::new()
            .route("/play", post(play))
            .route("/health", get(health))
            .route("/stats", get(stats))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(telemetry)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router with all layers applied, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Outcome tally behind `/stats`.
    pub fn tally(&self) -> Arc<ResultTally> {
        self.tally.clone()
    }

    /// Serve `listener` until `shutdown` fires, then give in-flight requests
    /// the grace period to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let stop = Arc::new(Notify::new());
        let stopped = stop.clone();
        let serve = axum::serve(listener, self.router).with_graceful_shutdown(async move {
            // Ok, Lagged and Closed all mean stop.
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            stopped.notify_one();
        });
        let mut serve = std::pin::pin!(serve.into_future());

        tokio::select! {
            result = &mut serve => {
                result?;
                tracing::info!("HTTP server stopped");
                return Ok(());
            }
            _ = stop.notified() => {}
        }

        match tokio::time::timeout(self.grace, serve).await {
            Ok(result) => {
                result?;
                tracing::info!("HTTP server stopped");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(grace = ?self.grace, "Drain timed out, dropping connections");
                Err(ServerError::DrainTimeout(self.grace))
            }
        }
    }
}
