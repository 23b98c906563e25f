//! Log pipeline and the `tracing` → OpenTelemetry log bridge.
//!
//! Every `tracing` event that passes the subscriber's filter is also
//! emitted as an OTel log record, carrying the trace context of the span
//! that is current when it fires.

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, WithExportConfig};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::Resource;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::Layer;

use super::{signal_endpoint, TelemetryError, TelemetrySettings};

/// Crates whose events must not reach the bridge: they run inside the
/// exporter itself and would feed every export back into the pipeline.
const EXPORTER_TARGETS: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "tonic",
    "opentelemetry",
];

/// Build the log pipeline: batch log processor → OTLP/HTTP exporter.
pub fn otlp_logger_provider(
    settings: &TelemetrySettings,
    resource: Resource,
) -> Result<SdkLoggerProvider, TelemetryError> {
    let exporter = LogExporter::builder()
        .with_http()
        .with_protocol(settings.otlp_protocol.into())
        .with_endpoint(signal_endpoint(&settings.otlp_endpoint, "logs"))
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: "logs",
            message: e.to_string(),
        })?;

    Ok(SdkLoggerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

/// Bridge layer forwarding application events to `provider`.
pub fn bridge_layer<S>(provider: &SdkLoggerProvider) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    OpenTelemetryTracingBridge::new(provider).with_filter(bridge_targets())
}

fn bridge_targets() -> Targets {
    EXPORTER_TARGETS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::TRACE), |targets, target| {
            targets.with_target(*target, LevelFilter::OFF)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_bridge_skips_exporter_transport() {
        let targets = bridge_targets();
        assert!(!targets.would_enable("hyper::client", &Level::ERROR));
        assert!(!targets.would_enable("opentelemetry_sdk::logs", &Level::WARN));
        assert!(!targets.would_enable("reqwest::connect", &Level::INFO));
    }

    #[test]
    fn test_bridge_keeps_application_events() {
        let targets = bridge_targets();
        assert!(targets.would_enable("otel_showcase::service::manual", &Level::INFO));
        assert!(targets.would_enable("tower_http::trace", &Level::ERROR));
    }
}
