//! HTTP handlers for the two showcase services.
//!
//! Both services expose the same endpoints with the same observable
//! behavior; they differ only in where the telemetry comes from:
//!
//! - [`auto`]: framework-level instrumentation wrapped around the router
//! - [`manual`]: spans, counters and histograms created in each handler

pub mod auto;
pub mod endpoints;
pub mod manual;

use axum::Router;
use std::sync::Arc;

use crate::config::{Config, Mode};
use crate::observability::http::{ExcludedPaths, HttpInstrumentation};
use crate::observability::Telemetry;

/// Build the router for `config.mode`, wired to `telemetry`'s providers.
pub fn build_router(config: &Config, telemetry: &Telemetry) -> Router {
    let meter = telemetry.meter();
    match config.mode {
        Mode::Auto => {
            let excluded = ExcludedPaths::new(config.excluded_paths.iter().cloned());
            auto::router(&HttpInstrumentation::new(&meter, excluded))
        }
        Mode::Manual => {
            let state = manual::ManualInstrumentation::new(telemetry.tracer(), &meter);
            manual::router(Arc::new(state))
        }
    }
}
