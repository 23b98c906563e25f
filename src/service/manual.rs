//! Manually-instrumented service.
//!
//! Every handler except `/health` opens its own span, counts the request,
//! times it into a per-endpoint histogram and logs the outcome. The span is
//! current while the handler logs, so log records carry its trace context.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::Request;
use axum::routing::get;
use axum::{Json, Router};
use opentelemetry::metrics::Meter;
use opentelemetry::trace::{Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use std::sync::Arc;

use super::endpoints::{
    self, ComputeParams, ComputeResponse, EchoResponse, Endpoint, HealthResponse,
    MessageResponse,
};
use crate::error::AppError;
use crate::observability::metrics::{EndpointInstruments, RequestTimer};
use crate::observability::Tracer;

/// Tracer and per-endpoint instruments injected into every handler.
pub struct ManualInstrumentation {
    tracer: Tracer,
    instruments: EndpointInstruments,
}

impl ManualInstrumentation {
    pub fn new(tracer: Tracer, meter: &Meter) -> Self {
        Self {
            tracer,
            instruments: EndpointInstruments::new(meter),
        }
    }

    pub fn instruments(&self) -> &EndpointInstruments {
        &self.instruments
    }

    /// Open `<endpoint>_endpoint_span`, count the request and start its timer.
    ///
    /// The span ends when the last clone of the returned context is dropped.
    fn begin(&self, endpoint: Endpoint) -> (Context, RequestTimer) {
        let span = self
            .tracer
            .start(format!("{}_endpoint_span", endpoint.name()));
        let cx = Context::current_with_span(span);
        let timer = self.instruments.get(endpoint).begin();
        (cx, timer)
    }
}

type SharedState = Arc<ManualInstrumentation>;

/// Build the manually-instrumented router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slow", get(slow))
        .route("/error", get(error))
        .route("/compute", get(compute))
        .route(
            "/server_request",
            get(server_request)
                .post(server_request)
                .put(server_request)
                .patch(server_request),
        )
        .with_state(state)
}

/// Mark the span in `cx` as failed by `err`.
fn record_failure(cx: &Context, err: &AppError) {
    let span = cx.span();
    span.record_error(err);
    span.set_status(Status::error(err.to_string()));
}

/// `result` as a span attribute, as a string when it exceeds `i64`.
fn result_attribute(result: i128) -> KeyValue {
    match i64::try_from(result) {
        Ok(result) => KeyValue::new("result", result),
        Err(_) => KeyValue::new("result", result.to_string()),
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn slow(State(state): State<SharedState>) -> Result<Json<MessageResponse>, AppError> {
    let (cx, timer) = state.begin(Endpoint::Slow);
    let result = endpoints::slow().await;
    drop(timer);

    let _guard = cx.clone().attach();
    match &result {
        Ok(_) => tracing::info!(endpoint = "slow", "slow endpoint"),
        Err(e) => {
            record_failure(&cx, e);
            tracing::warn!(endpoint = "slow", error = %e, "slow endpoint failed");
        }
    }
    result.map(Json)
}

async fn error(State(state): State<SharedState>) -> Result<Json<MessageResponse>, AppError> {
    let (cx, timer) = state.begin(Endpoint::Error);
    let _guard = cx.clone().attach();
    // Runs after the return value is built, on every exit path.
    let _timer = timer.on_finish(|_| tracing::error!(endpoint = "error", "error endpoint"));

    tracing::error!(endpoint = "error", "error endpoint");
    let err = endpoints::simulated_error();
    record_failure(&cx, &err);
    Err(err)
}

async fn compute(
    State(state): State<SharedState>,
    Query(params): Query<ComputeParams>,
) -> Result<Json<ComputeResponse>, AppError> {
    let (cx, timer) = state.begin(Endpoint::Compute);
    let _guard = cx.clone().attach();
    let n = params.n();

    let result = endpoints::compute(n);
    drop(timer);

    let span = cx.span();
    span.set_attribute(KeyValue::new("parameter.n", n));
    match &result {
        Ok(response) => {
            span.set_attribute(result_attribute(response.result));
            span.add_event("Completed computation", vec![]);
            tracing::info!(endpoint = "compute", "result: {}", response.result);
        }
        Err(e) => {
            record_failure(&cx, e);
            tracing::warn!(endpoint = "compute", n, error = %e, "computation rejected");
        }
    }
    result.map(Json)
}

async fn server_request(
    State(state): State<SharedState>,
    request: Request<Body>,
) -> Result<Json<EchoResponse>, AppError> {
    let (cx, timer) = state.begin(Endpoint::ServerRequest);
    let result = endpoints::echo(request).await;
    drop(timer);

    let _guard = cx.clone().attach();
    match &result {
        Ok(_) => tracing::info!(
            endpoint = "server_request",
            "The server requests has been processed successfully"
        ),
        Err(e) => {
            record_failure(&cx, e);
            tracing::warn!(endpoint = "server_request", error = %e, "server request rejected");
        }
    }
    result.map(Json)
}
