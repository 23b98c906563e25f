//! OTel Showcase: one HTTP service, two ways of instrumenting it.
//!
//! The same five endpoints run either with framework-level OpenTelemetry
//! instrumentation (`auto`) or with spans and instruments created by hand in
//! every handler (`manual`). Traces, metrics and logs leave the process over
//! OTLP/HTTP.
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`error`]: Handler errors and their HTTP mapping
//! - [`observability`]: Telemetry pipelines and HTTP instrumentation
//! - [`server`]: HTTP server lifecycle
//! - [`service`]: Endpoint handlers for both modes

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // observability::metrics::HttpServerMetrics is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod error;
pub mod observability;
pub mod server;
pub mod service;
