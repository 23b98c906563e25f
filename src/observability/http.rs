//! Framework-level HTTP instrumentation.
//!
//! Wraps a router so that every request gets, with no handler code:
//! - A server span (via `tower-http`'s `TraceLayer`), exported through the
//!   `tracing-opentelemetry` layer, child of any incoming W3C trace context
//! - `http.server.request.duration` and `http.server.active_requests`
//!
//! Paths listed in [`ExcludedPaths`] get neither.

use axum::extract::{MatchedPath, State};
use axum::http::{HeaderMap, Request, Response};
use axum::middleware::{self, Next};
use axum::Router;
use opentelemetry::metrics::{Meter, UpDownCounter};
use opentelemetry::propagation::Extractor;
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, HTTP_ROUTE,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::{MakeSpan, OnResponse, TraceLayer};
use tracing::{field, Level, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::metrics::HttpServerMetrics;

/// Request paths the instrumentation skips entirely.
#[derive(Debug, Clone, Default)]
pub struct ExcludedPaths(Arc<[String]>);

impl ExcludedPaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|excluded| excluded == path)
    }
}

/// The instrumentation hook: span maker, response recorder and metrics.
#[derive(Debug, Clone)]
pub struct HttpInstrumentation {
    excluded: ExcludedPaths,
    metrics: HttpServerMetrics,
}

impl HttpInstrumentation {
    pub fn new(meter: &Meter, excluded: ExcludedPaths) -> Self {
        Self {
            excluded,
            metrics: HttpServerMetrics::new(meter),
        }
    }

    /// Wrap every route of `router` (and its fallback).
    pub fn instrument<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let trace = TraceLayer::new_for_http()
            .make_span_with(ServerSpan {
                excluded: self.excluded.clone(),
            })
            .on_response(RecordStatus);

        router
            .layer(middleware::from_fn_with_state(
                self.clone(),
                record_request_metrics,
            ))
            .layer(trace)
    }
}

/// Route template the router matched, if any.
fn matched_route<B>(request: &Request<B>) -> Option<String> {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
}

/// Creates one server span per request.
#[derive(Debug, Clone)]
pub struct ServerSpan {
    excluded: ExcludedPaths,
}

impl<B> MakeSpan<B> for ServerSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let path = request.uri().path();
        if self.excluded.contains(path) {
            return Span::none();
        }

        let method = request.method();
        let route = matched_route(request);
        let name = match &route {
            Some(route) => format!("{method} {route}"),
            None => method.to_string(),
        };

        let span = tracing::span!(
            Level::INFO,
            "HTTP request",
            otel.name = %name,
            otel.kind = "server",
            otel.status_code = field::Empty,
            http.request.method = %method,
            http.route = route.as_deref().unwrap_or_default(),
            url.path = %path,
            http.response.status_code = field::Empty,
        );
        let _ = span.set_parent(extract_context(request.headers()));
        span
    }
}

/// Records the response status on the span and flags 5xx as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordStatus;

impl<B> OnResponse<B> for RecordStatus {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        span.record("http.response.status_code", i64::from(status.as_u16()));
        if status.is_server_error() {
            span.record("otel.status_code", "ERROR");
        }
        tracing::debug!(
            parent: span,
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "finished processing request"
        );
    }
}

/// Decrements the in-flight gauge even if the request future is dropped.
struct ActiveRequest {
    counter: UpDownCounter<i64>,
    attributes: Vec<KeyValue>,
}

impl ActiveRequest {
    fn start(counter: &UpDownCounter<i64>, attributes: Vec<KeyValue>) -> Self {
        counter.add(1, &attributes);
        Self {
            counter: counter.clone(),
            attributes,
        }
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.counter.add(-1, &self.attributes);
    }
}

async fn record_request_metrics(
    State(hook): State<HttpInstrumentation>,
    request: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    if hook.excluded.contains(request.uri().path()) {
        return next.run(request).await;
    }

    let mut attributes = vec![KeyValue::new(
        HTTP_REQUEST_METHOD,
        request.method().as_str().to_owned(),
    )];
    if let Some(route) = matched_route(&request) {
        attributes.push(KeyValue::new(HTTP_ROUTE, route));
    }

    let started = Instant::now();
    let active = ActiveRequest::start(&hook.metrics.active_requests, attributes.clone());
    let response = next.run(request).await;
    drop(active);

    attributes.push(KeyValue::new(
        HTTP_RESPONSE_STATUS_CODE,
        i64::from(response.status().as_u16()),
    ));
    hook.metrics
        .request_duration
        .record(started.elapsed().as_secs_f64(), &attributes);

    response
}

/// Reads W3C trace context from HTTP headers.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

/// Extracts the remote parent context using the global propagator.
///
/// Returns an empty context when the request carries none.
pub fn extract_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}
