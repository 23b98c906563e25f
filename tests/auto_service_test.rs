//! Auto-instrumented service tests.
//!
//! Tests:
//! - Endpoint responses match the shared business logic
//! - Every non-excluded request yields one server span and one duration sample
//! - Excluded paths yield neither
//! - Incoming W3C trace context becomes the span's parent

mod common;

use axum::http::{Request, StatusCode};
use common::{get, json_request, send, send_raw, TestTelemetry};
use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::{global, Value};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use otel_showcase::config::Mode;
use serde_json::json;

const REQUEST_DURATION: &str = "http.server.request.duration";
const ACTIVE_REQUESTS: &str = "http.server.active_requests";

fn attribute(span: &opentelemetry_sdk::trace::SpanData, key: &str) -> Option<Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

#[tokio::test]
async fn test_health_is_not_instrumented() {
    let telemetry = TestTelemetry::new();
    let _subscriber = telemetry.subscribe();
    let router = telemetry.router(Mode::Auto);

    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    assert!(telemetry.finished_spans().is_empty());
    assert_eq!(telemetry.histogram_count(REQUEST_DURATION), 0);
}

#[tokio::test]
async fn test_compute_produces_server_span() {
    let telemetry = TestTelemetry::new();
    let _subscriber = telemetry.subscribe();
    let router = telemetry.router(Mode::Auto);

    let (status, body) = send(&router, get("/compute?n=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": 285}));

    let span = telemetry
        .span_named("GET /compute")
        .expect("server span for /compute");
    assert_eq!(span.span_kind, SpanKind::Server);
    assert_eq!(attribute(&span, "http.route"), Some(Value::from("/compute")));
    assert_eq!(
        attribute(&span, "http.response.status_code"),
        Some(Value::I64(200))
    );
}

#[tokio::test]
async fn test_compute_edge_values() {
    let telemetry = TestTelemetry::new();
    let router = telemetry.router(Mode::Auto);

    let (_, body) = send(&router, get("/compute")).await;
    assert_eq!(body, json!({"result": 285}));

    let (_, body) = send(&router, get("/compute?n=0")).await;
    assert_eq!(body, json!({"result": 0}));

    let (_, body) = send(&router, get("/compute?n=-4")).await;
    assert_eq!(body, json!({"result": 0}));

    let (status, _) = send(&router, get("/compute?n=ten")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&router, get(&format!("/compute?n={}", i64::MAX))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_error_marks_span_failed() {
    let telemetry = TestTelemetry::new();
    let _subscriber = telemetry.subscribe();
    let router = telemetry.router(Mode::Auto);

    let (status, body) = send(&router, get("/error")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"detail": "This is a simulated error"}));

    let span = telemetry.span_named("GET /error").expect("server span for /error");
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(
        attribute(&span, "http.response.status_code"),
        Some(Value::I64(500))
    );
}

#[tokio::test]
async fn test_server_request_echoes_get() {
    let telemetry = TestTelemetry::new();
    let router = telemetry.router(Mode::Auto);

    let request = Request::builder()
        .uri("/server_request?a=1&b=two")
        .header("x-demo", "yes")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query_params"], json!({"a": "1", "b": "two"}));
    assert_eq!(body["headers"]["x-demo"], json!("yes"));
    assert_eq!(body["body"], json!({}));
}

#[tokio::test]
async fn test_server_request_echoes_json_body() {
    let telemetry = TestTelemetry::new();
    let router = telemetry.router(Mode::Auto);

    let (status, body) = send(&router, json_request("POST", "/server_request", r#"{"x":1}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], json!({"x": 1}));

    let (status, _) = send(&router, json_request("PUT", "/server_request", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_server_request_body_is_verbatim() {
    let telemetry = TestTelemetry::new();
    let router = telemetry.router(Mode::Auto);

    let payload = r#"{"b":1,"a":{"z":true,"y":null},"x":12345678901234567890123,"f":0.1}"#;
    let (status, body) = send_raw(
        &router,
        json_request("POST", "/server_request?z=1&a=2", payload),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&format!(r#""body":{payload}"#)), "{body}");
    assert!(body.contains(r#""query_params":{"z":"1","a":"2"}"#), "{body}");
}

#[tokio::test]
async fn test_request_metrics_skip_excluded_paths() {
    let telemetry = TestTelemetry::new();
    let router = telemetry.router(Mode::Auto);

    for _ in 0..3 {
        send(&router, get("/compute?n=3")).await;
    }
    send(&router, get("/error")).await;
    for _ in 0..5 {
        send(&router, get("/health")).await;
    }

    assert_eq!(telemetry.histogram_count(REQUEST_DURATION), 4);
    assert_eq!(telemetry.up_down_total(ACTIVE_REQUESTS), 0);
}

#[tokio::test]
async fn test_slow_latency_is_recorded() {
    let telemetry = TestTelemetry::new();
    let router = telemetry.router(Mode::Auto);

    let (status, body) = send(&router, get("/slow")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "This endpoint is slow"}));

    let (min, max) = telemetry
        .histogram_bounds(REQUEST_DURATION)
        .expect("one duration sample");
    assert!(min >= 0.5, "min = {min}");
    assert!(max < 3.0, "max = {max}");
}

#[tokio::test]
async fn test_incoming_trace_context_is_parent() {
    global::set_text_map_propagator(TraceContextPropagator::new());
    let telemetry = TestTelemetry::new();
    let _subscriber = telemetry.subscribe();
    let router = telemetry.router(Mode::Auto);

    let request = Request::builder()
        .uri("/compute?n=2")
        .header(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        )
        .body(axum::body::Body::empty())
        .unwrap();
    send(&router, request).await;

    let span = telemetry.span_named("GET /compute").expect("server span");
    assert_eq!(
        span.span_context.trace_id().to_string(),
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
    assert_eq!(span.parent_span_id.to_string(), "00f067aa0ba902b7");
}
