//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use roshambo::config::ServiceConfig;
use roshambo::lifecycle::{build_server, Shutdown};
use roshambo::observability::ResultTally;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running server whose spans land in memory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub tally: Arc<ResultTally>,
    pub exporter: InMemorySpanExporter,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), roshambo::http::ServerError>>,
    _tracer_provider: TracerProvider,
    _meter_provider: SdkMeterProvider,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[allow(dead_code)]
    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }

    /// Stop the server and wait for it to drain.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(15), self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok(), "server failed: {result:?}");
    }
}

/// Start the server on an ephemeral port with default configuration.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(ServiceConfig::default()).await
}

/// Start the server on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_app_with(mut config: ServiceConfig) -> TestApp {
    config.listener.bind_address = "127.0.0.1:0".to_string();

    let exporter = InMemorySpanExporter::default();
    let tracer_provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let meter_provider = SdkMeterProvider::default();

    let server = build_server(
        &config,
        tracer_provider.tracer("integration-test"),
        &meter_provider.meter("integration-test"),
    )
    .unwrap();
    let tally = server.tally();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestApp {
        addr,
        tally,
        exporter,
        shutdown,
        handle,
        _tracer_provider: tracer_provider,
        _meter_provider: meter_provider,
    }
}

/// POST a raw body to `/play`.
#[allow(dead_code)]
pub async fn play(client: &reqwest::Client, app: &TestApp, body: &str) -> reqwest::Response {
    client
        .post(app.url("/play"))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}
