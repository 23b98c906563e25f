//! Test utilities for the showcase services.
//!
//! Provides:
//! - In-memory telemetry (span, metric and log exporters) behind a [`Telemetry`]
//! - A `tracing` layer counting ERROR records
//! - Request helpers driving a router without a socket

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use opentelemetry_sdk::Resource;
use otel_showcase::config::{Config, Mode};
use otel_showcase::observability::{logs, Telemetry};
use otel_showcase::service::build_router;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Telemetry backed by in-memory exporters.
pub struct TestTelemetry {
    pub telemetry: Telemetry,
    pub spans: InMemorySpanExporter,
    pub metrics: InMemoryMetricExporter,
    pub logs: InMemoryLogExporter,
    pub errors: ErrorCounter,
}

impl TestTelemetry {
    pub fn new() -> Self {
        let spans = InMemorySpanExporter::default();
        let metrics = InMemoryMetricExporter::default();
        let logs = InMemoryLogExporter::default();
        let resource = Resource::builder().with_service_name("showcase-test").build();

        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_simple_exporter(spans.clone())
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(PeriodicReader::builder(metrics.clone()).build())
            .build();
        let logger_provider = SdkLoggerProvider::builder()
            .with_resource(resource.clone())
            .with_simple_exporter(logs.clone())
            .build();

        Self {
            telemetry: Telemetry::from_providers(
                resource,
                tracer_provider,
                meter_provider,
                logger_provider,
            ),
            spans,
            metrics,
            logs,
            errors: ErrorCounter::default(),
        }
    }

    /// Router for `mode` wired to these providers.
    pub fn router(&self, mode: Mode) -> Router {
        let config = Config {
            mode,
            ..Config::default()
        };
        build_router(&config, &self.telemetry)
    }

    /// Install a thread-local subscriber bridging spans and log records
    /// into the providers and counting ERROR records.
    ///
    /// Tests using it must run on a current-thread runtime.
    pub fn subscribe(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(self.telemetry.tracer()))
            .with(logs::bridge_layer(self.telemetry.logger_provider()))
            .with(self.errors.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        let _ = self.telemetry.tracer_provider().force_flush();
        self.spans.get_finished_spans().unwrap()
    }

    pub fn span_named(&self, name: &str) -> Option<SpanData> {
        self.finished_spans().into_iter().find(|span| span.name == name)
    }

    /// Trace ids carried by the exported log records.
    pub fn log_trace_ids(&self) -> Vec<String> {
        self.logs
            .get_emitted_logs()
            .unwrap()
            .iter()
            .filter_map(|log| log.record.trace_context())
            .map(|cx| cx.trace_id.to_string())
            .collect()
    }

    /// Sum of all data points of the `u64` counter `name`.
    pub fn counter_total(&self, name: &str) -> u64 {
        let mut total = 0;
        self.for_each_metric(name, |data| {
            if let AggregatedMetrics::U64(MetricData::Sum(sum)) = data {
                total += sum.data_points().map(|dp| dp.value()).sum::<u64>();
            }
        });
        total
    }

    /// Current value of the `i64` up/down counter `name`.
    pub fn up_down_total(&self, name: &str) -> i64 {
        let mut total = 0;
        self.for_each_metric(name, |data| {
            if let AggregatedMetrics::I64(MetricData::Sum(sum)) = data {
                total += sum.data_points().map(|dp| dp.value()).sum::<i64>();
            }
        });
        total
    }

    /// Number of samples recorded by the `f64` histogram `name`.
    pub fn histogram_count(&self, name: &str) -> u64 {
        let mut count = 0;
        self.for_each_metric(name, |data| {
            if let AggregatedMetrics::F64(MetricData::Histogram(hist)) = data {
                count += hist.data_points().map(|dp| dp.count()).sum::<u64>();
            }
        });
        count
    }

    /// (min, max) over all samples of the `f64` histogram `name`.
    pub fn histogram_bounds(&self, name: &str) -> Option<(f64, f64)> {
        let mut bounds: Option<(f64, f64)> = None;
        self.for_each_metric(name, |data| {
            if let AggregatedMetrics::F64(MetricData::Histogram(hist)) = data {
                for dp in hist.data_points() {
                    if let (Some(min), Some(max)) = (dp.min(), dp.max()) {
                        bounds = Some(match bounds {
                            Some((lo, hi)) => (lo.min(min), hi.max(max)),
                            None => (min, max),
                        });
                    }
                }
            }
        });
        bounds
    }

    fn for_each_metric(&self, name: &str, mut f: impl FnMut(&AggregatedMetrics)) {
        self.metrics.reset();
        self.telemetry.meter_provider().force_flush().unwrap();
        let exported = self.metrics.get_finished_metrics().unwrap();
        // Cumulative temporality: the latest export holds the totals.
        if let Some(latest) = exported.last() {
            for metric in latest.scope_metrics().flat_map(|scope| scope.metrics()) {
                if metric.name() == name {
                    f(metric.data());
                }
            }
        }
    }
}

/// Counts ERROR-level `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

/// Drive `request` through `router` and read the whole JSON body.
///
/// The response is fully consumed, so any span tied to it has ended.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send_raw(router, request).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        // Extractor rejections answer in plain text.
        serde_json::from_str(&body).unwrap_or(Value::String(body))
    };
    (status, json)
}

/// Like [`send`], but returns the response body exactly as written.
pub async fn send_raw(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}
