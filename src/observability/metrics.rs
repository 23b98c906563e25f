//! OTLP metrics implementation.
//!
//! Key metrics:
//! - `<endpoint>_requests_total`: Counter per manually-instrumented endpoint
//! - `<endpoint>_request_duration_seconds`: Histogram per manually-instrumented endpoint
//! - `http.server.request.duration`: Histogram recorded by the auto hook
//! - `http.server.active_requests`: In-flight requests seen by the auto hook

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::metric::HTTP_SERVER_REQUEST_DURATION;
use std::fmt;
use std::time::{Duration, Instant};

use super::{signal_endpoint, TelemetryError, TelemetrySettings};
use crate::service::endpoints::Endpoint;

/// Bucket boundaries advised by the HTTP semantic conventions, in seconds.
const HTTP_DURATION_BOUNDARIES: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Build the metric pipeline: periodic reader → OTLP/HTTP exporter.
pub fn otlp_meter_provider(
    settings: &TelemetrySettings,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = MetricExporter::builder()
        .with_http()
        .with_protocol(settings.otlp_protocol.into())
        .with_endpoint(signal_endpoint(&settings.otlp_endpoint, "metrics"))
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: "metrics",
            message: e.to_string(),
        })?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(settings.metric_export_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

/// Request counter and duration histogram owned by one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub requests: Counter<u64>,
    pub duration: Histogram<f64>,
}

impl EndpointMetrics {
    fn new(meter: &Meter, endpoint: Endpoint) -> Self {
        let name = endpoint.name();
        Self {
            requests: meter
                .u64_counter(format!("{name}_requests_total"))
                .with_description(format!("Total number of requests to the {name} endpoint"))
                .with_unit("1")
                .build(),
            duration: meter
                .f64_histogram(format!("{name}_request_duration_seconds"))
                .with_description(format!("Duration of {name} endpoint requests"))
                .with_unit("s")
                .build(),
        }
    }

    /// Count one request and start timing it.
    ///
    /// The elapsed time lands in [`Self::duration`] when the returned timer
    /// is dropped, whichever way the handler exits.
    pub fn begin(&self) -> RequestTimer {
        self.requests.add(1, &[]);
        RequestTimer {
            histogram: self.duration.clone(),
            started: Instant::now(),
            on_finish: None,
        }
    }
}

/// Instruments for every manually-instrumented endpoint.
///
/// Built once at startup; request handling only reads it.
#[derive(Debug)]
pub struct EndpointInstruments {
    by_endpoint: [EndpointMetrics; Endpoint::ALL.len()],
}

impl EndpointInstruments {
    pub fn new(meter: &Meter) -> Self {
        Self {
            by_endpoint: Endpoint::ALL.map(|endpoint| EndpointMetrics::new(meter, endpoint)),
        }
    }

    pub fn get(&self, endpoint: Endpoint) -> &EndpointMetrics {
        &self.by_endpoint[endpoint.index()]
    }
}

/// Records a duration sample when dropped.
#[must_use = "the duration is recorded when the timer is dropped"]
pub struct RequestTimer {
    histogram: Histogram<f64>,
    started: Instant,
    on_finish: Option<Box<dyn FnOnce(Duration) + Send>>,
}

impl RequestTimer {
    /// Run `f` with the elapsed time after the sample is recorded.
    pub fn on_finish(mut self, f: impl FnOnce(Duration) + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(f));
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl fmt::Debug for RequestTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTimer")
            .field("started", &self.started)
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        self.histogram.record(elapsed.as_secs_f64(), &[]);
        if let Some(f) = self.on_finish.take() {
            f(elapsed);
        }
    }
}

/// Instruments recorded by the framework-level HTTP hook.
#[derive(Debug, Clone)]
pub struct HttpServerMetrics {
    pub request_duration: Histogram<f64>,
    pub active_requests: UpDownCounter<i64>,
}

impl HttpServerMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            request_duration: meter
                .f64_histogram(HTTP_SERVER_REQUEST_DURATION)
                .with_description("Duration of HTTP server requests")
                .with_unit("s")
                .with_boundaries(HTTP_DURATION_BOUNDARIES.to_vec())
                .build(),
            active_requests: meter
                .i64_up_down_counter("http.server.active_requests")
                .with_description("Number of active HTTP server requests")
                .with_unit("{request}")
                .build(),
        }
    }
}
