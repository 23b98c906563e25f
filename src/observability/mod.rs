//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - One resource descriptor shared by traces, metrics and logs
//! - OTLP/HTTP export pipelines for all three signals
//! - `tracing` subscriber wiring (fmt output, span bridge, log bridge)
//! - The HTTP instrumentation hook used by the auto-instrumented service
//! - Per-endpoint instruments used by the manually-instrumented service

pub mod http;
pub mod logs;
pub mod metrics;
pub mod tracing;

use clap::ValueEnum;
use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use std::time::Duration;

/// Instrumentation scope name for tracers and meters created by this crate.
pub const INSTRUMENTATION_SCOPE: &str = "otel-showcase";

/// Tracer handed out by the SDK tracer provider.
pub type Tracer = <SdkTracerProvider as TracerProvider>::Tracer;

/// Errors raised while bootstrapping telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to build {signal} exporter: {message}")]
    Exporter {
        signal: &'static str,
        message: String,
    },

    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Log output format for the console layer.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Encoding used on the OTLP/HTTP transport.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpProtocol {
    /// Protobuf over HTTP
    #[value(alias = "http/protobuf")]
    HttpBinary,
    /// JSON over HTTP
    #[value(alias = "http/json")]
    HttpJson,
}

impl From<OtlpProtocol> for opentelemetry_otlp::Protocol {
    fn from(protocol: OtlpProtocol) -> Self {
        match protocol {
            OtlpProtocol::HttpBinary => opentelemetry_otlp::Protocol::HttpBinary,
            OtlpProtocol::HttpJson => opentelemetry_otlp::Protocol::HttpJson,
        }
    }
}

/// Everything the bootstrap needs to know.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub service_name: String,
    pub service_version: String,
    /// Collector base URL; `/v1/<signal>` is appended per pipeline.
    pub otlp_endpoint: String,
    pub otlp_protocol: OtlpProtocol,
    pub metric_export_interval: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Build the resource descriptor attached to every signal.
pub fn build_resource(settings: &TelemetrySettings) -> Resource {
    Resource::builder()
        .with_service_name(settings.service_name.clone())
        .with_attribute(KeyValue::new(
            SERVICE_VERSION,
            settings.service_version.clone(),
        ))
        .build()
}

/// Signal-specific OTLP/HTTP URL, e.g. `http://localhost:4318/v1/traces`.
pub fn signal_endpoint(base: &str, signal: &str) -> String {
    format!("{}/v1/{}", base.trim_end_matches('/'), signal)
}

/// The three SDK providers sharing one resource.
///
/// Building providers has no process-wide side effects; [`Telemetry::install`]
/// registers them globally and installs the `tracing` subscriber.
pub struct Telemetry {
    resource: Resource,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: SdkLoggerProvider,
}

impl Telemetry {
    /// Build OTLP/HTTP pipelines for traces, metrics and logs.
    ///
    /// Nothing is sent until records are produced; an unreachable collector
    /// only shows up as export errors inside the SDK.
    pub fn otlp(settings: &TelemetrySettings) -> Result<Self, TelemetryError> {
        let resource = build_resource(settings);
        Ok(Self {
            tracer_provider: tracing::otlp_tracer_provider(settings, resource.clone())?,
            meter_provider: metrics::otlp_meter_provider(settings, resource.clone())?,
            logger_provider: logs::otlp_logger_provider(settings, resource.clone())?,
            resource,
        })
    }

    /// Wrap already-built providers (used with in-memory exporters in tests).
    pub fn from_providers(
        resource: Resource,
        tracer_provider: SdkTracerProvider,
        meter_provider: SdkMeterProvider,
        logger_provider: SdkLoggerProvider,
    ) -> Self {
        Self {
            resource,
            tracer_provider,
            meter_provider,
            logger_provider,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    pub fn logger_provider(&self) -> &SdkLoggerProvider {
        &self.logger_provider
    }

    /// Tracer for hand-written spans.
    pub fn tracer(&self) -> Tracer {
        self.tracer_provider.tracer(INSTRUMENTATION_SCOPE)
    }

    /// Meter for hand-written and framework-level instruments.
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(INSTRUMENTATION_SCOPE)
    }

    /// Register the providers process-wide and install the subscriber.
    ///
    /// Must run once, before any request is handled. The returned guard
    /// flushes every pipeline when dropped.
    pub fn install(self, settings: &TelemetrySettings) -> Result<TelemetryGuard, TelemetryError> {
        global::set_text_map_propagator(TraceContextPropagator::new());
        global::set_tracer_provider(self.tracer_provider.clone());
        global::set_meter_provider(self.meter_provider.clone());

        tracing::init_subscriber(settings, &self.tracer(), &self.logger_provider)?;

        ::tracing::info!(
            service.name = %settings.service_name,
            service.version = %settings.service_version,
            otlp.endpoint = %settings.otlp_endpoint,
            "Telemetry initialized with OTLP exporters"
        );

        Ok(TelemetryGuard { telemetry: self })
    }
}

/// Guard that ensures proper shutdown of the OpenTelemetry providers.
/// Drop this guard to flush and shut down all telemetry.
pub struct TelemetryGuard {
    telemetry: Telemetry,
}

impl TelemetryGuard {
    /// The installed providers.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let telemetry = &self.telemetry;
        // Logs first: the other two shutdowns may still emit records.
        if let Err(e) = telemetry.logger_provider.shutdown() {
            eprintln!("Failed to shutdown logger provider: {e:?}");
        }
        if let Err(e) = telemetry.meter_provider.shutdown() {
            eprintln!("Failed to shutdown meter provider: {e:?}");
        }
        if let Err(e) = telemetry.tracer_provider.shutdown() {
            eprintln!("Failed to shutdown tracer provider: {e:?}");
        }
    }
}
