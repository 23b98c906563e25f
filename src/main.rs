//! OTel Showcase: the same HTTP service with automatic or manual
//! OpenTelemetry instrumentation.
//!
//! # Usage
//!
//! ```bash
//! otel-showcase auto   # framework instrumentation, port 8000
//! otel-showcase manual # hand-written instrumentation, port 8001
//! ```
//!
//! Environment variables can also be used:
//! - `SHOWCASE_MODE`: `auto` or `manual`
//! - `SHOWCASE_PORT`: Port to listen on
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector base URL
//! - `OTEL_SERVICE_NAME`: Service name reported on every signal
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use otel_showcase::config::Config;
use otel_showcase::observability::Telemetry;
use otel_showcase::server::run_server;
use otel_showcase::service::build_router;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  OTel Showcase v{} - {:?} instrumentation

  Configuration:
    Address:    {}
    Service:    {} {}
    Collector:  {}
    Log Level:  {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.mode,
        config.bind_address(),
        config.service_name(),
        config.service_version,
        config.otel_endpoint,
        config.log_level
    );
}

/// Resolve once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {
                        tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating shutdown...");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();
    let settings = config.telemetry_settings();

    // The blocking OTLP client must be built outside the async runtime
    let telemetry = Telemetry::otlp(&settings)?;
    let router = build_router(&config, &telemetry);
    let guard = telemetry.install(&settings)?;

    print_banner(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        // Create shutdown signal channel
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Spawn signal handler task
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        run_server(&config, router, shutdown_rx).await
    })?;

    tracing::info!("OTel Showcase shutdown complete");

    // Flush telemetry after the runtime is gone
    drop(runtime);
    drop(guard);
    Ok(())
}
