//! OpenTelemetry tracing setup.
//!
//! Configures structured logging with:
//! - Console output (text or JSON) filtered by `RUST_LOG`
//! - A `tracing-opentelemetry` layer turning `tracing` spans into OTel spans
//! - The OTLP log bridge (see [`super::logs`])

use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::{logs, signal_endpoint, LogFormat, TelemetryError, TelemetrySettings, Tracer};

/// Build the trace pipeline: batch span processor → OTLP/HTTP exporter.
pub fn otlp_tracer_provider(
    settings: &TelemetrySettings,
    resource: Resource,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(settings.otlp_protocol.into())
        .with_endpoint(signal_endpoint(&settings.otlp_endpoint, "traces"))
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: "traces",
            message: e.to_string(),
        })?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

/// Install the global `tracing` subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_subscriber(
    settings: &TelemetrySettings,
    tracer: &Tracer,
    logger_provider: &SdkLoggerProvider,
) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.log_level).map_err(|e| TelemetryError::Filter {
            filter: settings.log_level.clone(),
            message: e.to_string(),
        })?,
    };

    let json = settings.log_format == LogFormat::Json;
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer.clone()))
        .with(logs::bridge_layer(logger_provider))
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
