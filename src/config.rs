//! Configuration parsing for the showcase services.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Per-mode defaults (port, service name)

use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::observability::{LogFormat, OtlpProtocol, TelemetrySettings};

/// Which flavour of the demo service to run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Framework-level instrumentation, no per-endpoint telemetry code
    Auto,
    /// Hand-written spans, counters and histograms in every handler
    Manual,
}

impl Mode {
    /// Port the service listens on unless overridden.
    pub fn default_port(self) -> u16 {
        match self {
            Mode::Auto => 8000,
            Mode::Manual => 8001,
        }
    }

    /// `service.name` resource attribute unless overridden.
    pub fn default_service_name(self) -> &'static str {
        match self {
            Mode::Auto => "cf-o11y-instrumentor",
            Mode::Manual => "cf-o11y",
        }
    }
}

/// otel-showcase: HTTP services instrumented with OpenTelemetry.
#[derive(Parser, Debug, Clone)]
#[command(name = "otel-showcase")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Service flavour to run
    #[arg(value_enum, env = "SHOWCASE_MODE", default_value_t = Mode::Manual)]
    pub mode: Mode,

    /// Host address to bind to
    #[arg(long, env = "SHOWCASE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (8000 for auto, 8001 for manual)
    #[arg(short, long, env = "SHOWCASE_PORT")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "SHOWCASE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OpenTelemetry collector base endpoint
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = "http://localhost:4318")]
    pub otel_endpoint: String,

    /// OTLP payload encoding
    #[arg(long, env = "OTEL_EXPORTER_OTLP_PROTOCOL", value_enum, default_value_t = OtlpProtocol::HttpBinary)]
    pub otel_protocol: OtlpProtocol,

    /// Service name reported in the resource descriptor
    #[arg(long, env = "OTEL_SERVICE_NAME")]
    pub service_name: Option<String>,

    /// Service version reported in the resource descriptor
    #[arg(long, env = "SHOWCASE_SERVICE_VERSION", default_value = "1.0-BETA")]
    pub service_version: String,

    /// Seconds between metric exports
    #[arg(long, env = "SHOWCASE_METRIC_EXPORT_INTERVAL_SECS", default_value_t = 60)]
    pub metric_export_interval_secs: u64,

    /// Paths the automatic instrumentation skips
    #[arg(
        long,
        env = "SHOWCASE_EXCLUDED_PATHS",
        value_delimiter = ',',
        default_value = "/health"
    )]
    pub excluded_paths: Vec<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Port after applying the per-mode default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.mode.default_port())
    }

    /// Service name after applying the per-mode default.
    pub fn service_name(&self) -> &str {
        self.service_name
            .as_deref()
            .unwrap_or_else(|| self.mode.default_service_name())
    }

    /// Socket address string the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }

    /// Settings handed to the telemetry bootstrap.
    pub fn telemetry_settings(&self) -> TelemetrySettings {
        TelemetrySettings {
            service_name: self.service_name().to_string(),
            service_version: self.service_version.clone(),
            otlp_endpoint: self.otel_endpoint.clone(),
            otlp_protocol: self.otel_protocol,
            metric_export_interval: Duration::from_secs(self.metric_export_interval_secs),
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }

    /// Create a configuration for testing.
    #[cfg(test)]
    pub fn test_config(mode: Mode) -> Self {
        Self {
            mode,
            host: "127.0.0.1".into(),
            port: Some(0), // Random port
            log_level: "debug".into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Manual,
            host: "0.0.0.0".into(),
            port: None,
            log_level: "info".into(),
            log_format: LogFormat::Text,
            otel_endpoint: "http://localhost:4318".into(),
            otel_protocol: OtlpProtocol::HttpBinary,
            service_name: None,
            service_version: "1.0-BETA".into(),
            metric_export_interval_secs: 60,
            excluded_paths: vec!["/health".into()],
        }
    }
}
