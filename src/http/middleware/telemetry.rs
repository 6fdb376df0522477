//! Request telemetry middleware.
//!
//! Wraps any request handler so that each request runs inside its own server
//! span and is counted in the HTTP server metrics. Paths in the bypass set
//! pass straight through with no span and no metrics.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use opentelemetry::metrics::Meter;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::Tracer;
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_PATH,
};
use tower::{Layer, Service};

use crate::observability::metrics::{HttpServerMetrics, HTTP_PATH};
use crate::observability::tracing::{span_name, HeaderExtractor, HTTP_OPERATION};

/// Paths excluded from instrumentation unless configured otherwise.
pub const DEFAULT_BYPASS_PATHS: &[&str] = &["/health"];

/// Knobs for [`TelemetryLayer`].
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// First word of every span name.
    pub operation: String,
    /// Exact request paths that skip instrumentation.
    pub bypass_paths: Vec<String>,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            operation: HTTP_OPERATION.to_string(),
            bypass_paths: DEFAULT_BYPASS_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Trace context of the request being handled.
///
/// Inserted by [`TelemetryLayer`]; handlers extract it and pass it down.
/// Without the layer the extractor falls back to the ambient context.
#[derive(Debug, Clone)]
pub struct TraceContext(pub Context);

impl<S> FromRequestParts<S> for TraceContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TraceContext>()
            .cloned()
            .unwrap_or_else(|| TraceContext(Context::current())))
    }
}

struct TelemetryShared {
    operation: String,
    tracer: Tracer,
    metrics: HttpServerMetrics,
    propagator: TraceContextPropagator,
    bypass: HashSet<String>,
}

impl TelemetryShared {
    fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.contains(path)
    }
}

/// Layer that instruments the wrapped service.
#[derive(Clone)]
pub struct TelemetryLayer {
    shared: Arc<TelemetryShared>,
}

impl TelemetryLayer {
    /// Instrument with `tracer` and record HTTP metrics on `meter`.
    pub fn new(tracer: Tracer, meter: &Meter, options: TelemetryOptions) -> Self {
        Self {
            shared: Arc::new(TelemetryShared {
                operation: options.operation,
                tracer,
                metrics: HttpServerMetrics::new(meter),
                propagator: TraceContextPropagator::new(),
                bypass: options.bypass_paths.into_iter().collect(),
            }),
        }
    }
}

impl<S> Layer<S> for TelemetryLayer {
    type Service = TelemetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TelemetryService {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service produced by [`TelemetryLayer`].
#[derive(Clone)]
pub struct TelemetryService<S> {
    inner: S,
    shared: Arc<TelemetryShared>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TelemetryService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Call the instance that was polled ready; keep a fresh clone for the next call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if self.shared.is_bypassed(req.uri().path()) {
            return Box::pin(inner.call(req));
        }

        let shared = self.shared.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let parent = shared.propagator.extract(&HeaderExtractor(req.headers()));
        let span = shared
            .tracer
            .span_builder(span_name(&shared.operation, &method, &path))
            .with_kind(SpanKind::Server)
            .with_attributes([
                KeyValue::new(HTTP_PATH, path.clone()),
                KeyValue::new(HTTP_REQUEST_METHOD, method.to_string()),
                KeyValue::new(URL_PATH, path.clone()),
            ])
            .start_with_context(&shared.tracer, &parent);
        let cx = parent.with_span(span);

        req.extensions_mut().insert(TraceContext(cx.clone()));
        let started = Instant::now();
        let response = {
            let _attached = cx.clone().attach();
            inner.call(req)
        }
        .with_context(cx.clone());

        Box::pin(async move {
            let result = response.await;

            let span = cx.span();
            let status = match &result {
                Ok(response) => {
                    let status = response.status();
                    span.set_attribute(KeyValue::new(
                        HTTP_RESPONSE_STATUS_CODE,
                        i64::from(status.as_u16()),
                    ));
                    if is_failure(status) {
                        span.set_status(Status::error(status.to_string()));
                    }
                    Some(status)
                }
                Err(_) => {
                    span.set_status(Status::error("handler failed"));
                    None
                }
            };
            shared
                .metrics
                .record(method.as_str(), &path, status, started.elapsed());
            span.end();

            result
        })
    }
}

/// Whether a status should be reported as a failed request.
pub fn is_failure(status: StatusCode) -> bool {
    status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry::trace::{SpanId, TraceId, TracerProvider as _};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use opentelemetry_sdk::trace::TracerProvider;
    use tower::{service_fn, ServiceExt};

    struct Harness {
        exporter: InMemorySpanExporter,
        _provider: TracerProvider,
        layer: TelemetryLayer,
    }

    fn harness() -> Harness {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let meter = SdkMeterProvider::default().meter("middleware-test");
        let layer = TelemetryLayer::new(
            provider.tracer("middleware-test"),
            &meter,
            TelemetryOptions::default(),
        );
        Harness {
            exporter,
            _provider: provider,
            layer,
        }
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn respond_with(status: StatusCode) -> Result<Response<Body>, Infallible> {
        Ok(Response::builder().status(status).body(Body::empty()).unwrap())
    }

    fn attribute(span: &opentelemetry_sdk::export::trace::SpanData, key: &str) -> Option<String> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.as_str().into_owned())
    }

    #[tokio::test]
    async fn wraps_request_in_named_server_span() {
        let h = harness();
        let svc = h.layer.layer(service_fn(|_req: Request<Body>| respond_with(StatusCode::OK)));

        let res = svc.oneshot(request("POST", "/play")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "HTTP POST /play");
        assert_eq!(span.span_kind, SpanKind::Server);
        assert_eq!(attribute(span, HTTP_PATH).as_deref(), Some("/play"));
        assert_eq!(attribute(span, HTTP_REQUEST_METHOD).as_deref(), Some("POST"));
        assert_eq!(attribute(span, HTTP_RESPONSE_STATUS_CODE).as_deref(), Some("200"));
        assert_eq!(span.status, Status::Unset);
    }

    #[tokio::test]
    async fn bypass_path_produces_no_span() {
        let h = harness();
        let svc = h.layer.layer(service_fn(|req: Request<Body>| async move {
            let traced = req.extensions().get::<TraceContext>().is_some();
            assert_eq!(traced, req.uri().path() != "/health");
            respond_with(StatusCode::OK).await
        }));

        for _ in 0..25 {
            let res = svc.clone().oneshot(request("GET", "/health")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        assert!(h.exporter.get_finished_spans().unwrap().is_empty());

        // Only the exact path is bypassed.
        svc.oneshot(request("GET", "/health/deep")).await.unwrap();
        assert_eq!(h.exporter.get_finished_spans().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn handler_sees_active_span_context() {
        let h = harness();
        let svc = h.layer.layer(service_fn(|req: Request<Body>| async move {
            let TraceContext(cx) = req.extensions().get::<TraceContext>().cloned().unwrap();
            assert!(cx.span().span_context().is_valid());
            // The same context is current while the handler runs.
            assert_eq!(
                Context::current().span().span_context().span_id(),
                cx.span().span_context().span_id()
            );
            respond_with(StatusCode::OK).await
        }));

        svc.oneshot(request("POST", "/play")).await.unwrap();
        assert_eq!(h.exporter.get_finished_spans().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_errors_mark_span_failed() {
        let h = harness();
        let svc = h.layer.layer(service_fn(|_req: Request<Body>| {
            respond_with(StatusCode::INTERNAL_SERVER_ERROR)
        }));

        svc.oneshot(request("POST", "/play")).await.unwrap();

        let spans = h.exporter.get_finished_spans().unwrap();
        assert!(matches!(spans[0].status, Status::Error { .. }));
    }

    #[tokio::test]
    async fn client_errors_keep_span_status_unset() {
        let h = harness();
        let svc = h.layer.layer(service_fn(|_req: Request<Body>| respond_with(StatusCode::BAD_REQUEST)));

        svc.oneshot(request("POST", "/play")).await.unwrap();

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].status, Status::Unset);
        assert_eq!(attribute(&spans[0], HTTP_RESPONSE_STATUS_CODE).as_deref(), Some("400"));
    }

    #[tokio::test]
    async fn continues_incoming_w3c_trace() {
        let h = harness();
        let svc = h.layer.layer(service_fn(|_req: Request<Body>| respond_with(StatusCode::OK)));

        let req = Request::builder()
            .method("POST")
            .uri("/play")
            .header(
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            )
            .body(Body::empty())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(
            spans[0].span_context.trace_id(),
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );
        assert_eq!(
            spans[0].parent_span_id,
            SpanId::from_hex("00f067aa0ba902b7").unwrap()
        );
    }

    #[tokio::test]
    async fn stacked_layers_each_own_a_span() {
        let h = harness();
        let inner = h.layer.layer(service_fn(|_req: Request<Body>| respond_with(StatusCode::OK)));
        let svc = h.layer.layer(inner);

        svc.oneshot(request("GET", "/stats")).await.unwrap();

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 2);
        // Inner span finishes first and is a child of the outer one.
        assert_eq!(spans[0].parent_span_id, spans[1].span_context.span_id());
    }

    #[tokio::test]
    async fn extractor_falls_back_without_layer() {
        let (mut parts, _) = request("GET", "/").into_parts();
        let TraceContext(cx) = TraceContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(!cx.span().span_context().is_valid());
    }

    #[test]
    fn only_server_errors_are_failures() {
        assert!(is_failure(StatusCode::BAD_GATEWAY));
        assert!(!is_failure(StatusCode::BAD_REQUEST));
    }
}
